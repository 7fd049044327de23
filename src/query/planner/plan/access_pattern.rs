//! 访问模式
//!
//! 数据源声明的约束要求：模式中的每个元素都被条件约束之后，该数据源才允许被查询。
//! 一个访问节点可以携带多个互为替代的访问模式，满足其中任意一个即可。

use std::fmt;

use serde::Serialize;

use crate::core::types::ElementSymbol;

/// 访问模式
///
/// `unsatisfied` 为尚未被约束的元素，`history` 记录每次收缩前后的未满足集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessPattern {
    unsatisfied: Vec<ElementSymbol>,
    history: Vec<Vec<ElementSymbol>>,
}

impl AccessPattern {
    pub fn new(elements: Vec<ElementSymbol>) -> Self {
        Self {
            history: vec![elements.clone()],
            unsatisfied: elements,
        }
    }

    pub fn unsatisfied(&self) -> &[ElementSymbol] {
        &self.unsatisfied
    }

    pub fn history(&self) -> &[Vec<ElementSymbol>] {
        &self.history
    }

    pub fn is_satisfied(&self) -> bool {
        self.unsatisfied.is_empty()
    }

    /// 从未满足集合中移除被约束的元素
    ///
    /// 集合发生变化且仍不为空时记录一条新的历史；返回是否已完全满足
    pub fn satisfy<'a>(&mut self, constrained: impl IntoIterator<Item = &'a ElementSymbol>) -> bool {
        let before = self.unsatisfied.len();
        for element in constrained {
            self.unsatisfied.retain(|e| e != element);
        }
        if self.unsatisfied.len() != before && !self.unsatisfied.is_empty() {
            self.history.push(self.unsatisfied.clone());
        }
        self.is_satisfied()
    }
}

fn write_elements(f: &mut fmt::Formatter<'_>, elements: &[ElementSymbol]) -> fmt::Result {
    write!(f, "[")?;
    for (i, e) in elements.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", e)?;
    }
    write!(f, "]")
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Access Pattern: Unsatisfied ")?;
        write_elements(f, &self.unsatisfied)?;
        write!(f, " History [")?;
        for (i, h) in self.history.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_elements(f, h)?;
        }
        write!(f, "]")
    }
}
