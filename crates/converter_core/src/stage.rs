use std::fmt;

use crate::ErrorKind;

/// Lifecycle of one item inside an item processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Pending,
    Downloading,
    Converting,
    Copying,
    Uploading,
    Succeeded,
    Failed(ErrorKind),
    CleanedUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid item stage transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ItemStage,
    pub to: ItemStage,
}

impl ItemStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStage::Succeeded | ItemStage::Failed(_))
    }

    pub fn can_transition_to(self, next: ItemStage) -> bool {
        use ItemStage::*;
        match (self, next) {
            (Pending, Downloading) => true,
            (Downloading, Converting | Copying) => true,
            (Converting | Copying, Uploading) => true,
            (Uploading, Succeeded) => true,
            (from, Failed(_)) => !from.is_terminal() && from != CleanedUp,
            (Succeeded | Failed(_), CleanedUp) => true,
            _ => false,
        }
    }

    pub fn advance(self, next: ItemStage) -> Result<ItemStage, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStage::Pending => write!(f, "pending"),
            ItemStage::Downloading => write!(f, "downloading"),
            ItemStage::Converting => write!(f, "converting"),
            ItemStage::Copying => write!(f, "copying"),
            ItemStage::Uploading => write!(f, "uploading"),
            ItemStage::Succeeded => write!(f, "succeeded"),
            ItemStage::Failed(kind) => write!(f, "failed({kind})"),
            ItemStage::CleanedUp => write!(f, "cleaned up"),
        }
    }
}
