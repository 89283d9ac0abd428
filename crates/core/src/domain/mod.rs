pub mod approval;
pub mod attachment;
pub mod document;
pub mod template;
