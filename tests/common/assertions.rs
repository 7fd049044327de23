//! 自定义断言辅助模块

use std::fmt::{Debug, Display};

use fedplan::query::planner::plan::{NodeId, NodeType, PlanTree};

/// 断言结果成功，返回内部值
pub fn assert_ok<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("操作应该成功, 实际错误: {}", err),
    }
}

/// 断言结果失败并匹配错误消息
pub fn assert_err_with<T: Debug, E: Display>(result: Result<T, E>, expected_msg: &str) {
    let err_str = match result {
        Ok(value) => panic!("操作应该失败, 实际返回: {:?}", value),
        Err(err) => err.to_string(),
    };
    assert!(
        err_str.contains(expected_msg),
        "错误消息应包含 '{}', 实际是 '{}'",
        expected_msg,
        err_str
    );
}

/// 断言节点类型
pub fn assert_node_type(tree: &PlanTree, node: NodeId, expected: NodeType) {
    assert_eq!(
        tree.node_type(node),
        expected,
        "节点 {} 类型不匹配, 计划:\n{}",
        node,
        tree
    );
}

/// 断言计划树结构合法
pub fn assert_valid(tree: &PlanTree) {
    if let Err(err) = tree.validate() {
        panic!("计划树结构不合法: {}\n{}", err, tree);
    }
}
