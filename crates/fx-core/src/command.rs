// ABOUTME: Commands the UI layer sends to the frame orchestrator.
// ABOUTME: Applied between frames; the next render picks up the change.

use serde_json::{Map, Value};

use crate::effects::EffectKind;
use crate::options::patch_for_path;

/// Which options record a command edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionTarget {
    Effect(EffectKind),
    PostProcess,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetActiveEffect(EffectKind),
    /// Set one field. Dotted paths (`bloom.intensity`) reach nested tables.
    SetOption {
        target: OptionTarget,
        field: String,
        value: Value,
    },
    /// Merge a partial record over the current options.
    UpdateOptions {
        target: OptionTarget,
        partial: Map<String, Value>,
    },
}

impl Command {
    pub fn set_option(target: OptionTarget, field: &str, value: impl Into<Value>) -> Self {
        Command::SetOption {
            target,
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// The partial record this command merges, if it edits options.
    pub fn into_patch(self) -> Option<(OptionTarget, Map<String, Value>)> {
        match self {
            Command::SetActiveEffect(_) => None,
            Command::SetOption {
                target,
                field,
                value,
            } => Some((target, patch_for_path(&field, value))),
            Command::UpdateOptions { target, partial } => Some((target, partial)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_option_becomes_nested_patch() {
        let command = Command::set_option(OptionTarget::PostProcess, "bloom.enabled", true);
        let (target, patch) = command.into_patch().unwrap();
        assert_eq!(target, OptionTarget::PostProcess);
        assert_eq!(Value::Object(patch), json!({ "bloom": { "enabled": true } }));
    }

    #[test]
    fn active_effect_has_no_patch() {
        assert!(Command::SetActiveEffect(EffectKind::Vhs).into_patch().is_none());
    }
}
