//! 选配核心模块：词组切分、素材匹配、片段合并与方案装配。
//!
//! 本模块下的所有函数都是对内存结构的单遍纯计算：不做任何阻塞
//! I/O，不持有共享可变状态，对相同输入永远给出相同输出。
//! 输出顺序始终等于输入词组顺序，这是可复现测试的前提。

pub mod consolidator;
pub mod grouper;
pub mod matcher;
pub mod planner;
pub mod types;

pub use consolidator::consolidate;
pub use grouper::{extract_key_terms, group_words};
pub use matcher::match_groups;
pub use planner::{PlanOutcome, build_plan};
