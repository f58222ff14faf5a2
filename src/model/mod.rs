//! 定义了与外部协作方交换的核心数据结构。

pub mod media;
pub mod plan;
pub mod transcript;
