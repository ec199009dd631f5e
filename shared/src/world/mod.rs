pub mod change_set;
pub mod reconciler;
pub mod trackable;
