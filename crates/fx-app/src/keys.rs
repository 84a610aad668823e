// ABOUTME: Keyboard bindings: maps a pressed key to a renderer command or an app action.
// ABOUTME: Toggles read the current options so one key flips a setting on and off.

use winit::keyboard::{Key, NamedKey};

use fx_core::ascii::MIN_CELL_SIZE;
use fx_core::{AsciiOptions, Command, EffectKind, OptionTarget, PostEffect, PostProcessOptions};

const CELL_SIZE_STEP: f32 = 2.0;
const MAX_CELL_SIZE: f32 = 64.0;

#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Apply(Command),
    Capture,
    ExportText,
    Quit,
}

/// Options the bindings need to compute toggles.
pub struct KeyContext<'a> {
    pub active: EffectKind,
    pub post: &'a PostProcessOptions,
    pub ascii: &'a AsciiOptions,
}

fn toggle(post: &PostProcessOptions, effect: PostEffect) -> KeyAction {
    let field = format!("{}.enabled", effect.key());
    KeyAction::Apply(Command::set_option(
        OptionTarget::PostProcess,
        &field,
        !post.is_enabled(effect),
    ))
}

fn ascii_option(field: &str, value: serde_json::Value) -> KeyAction {
    KeyAction::Apply(Command::set_option(OptionTarget::Effect(EffectKind::Ascii), field, value))
}

pub fn action_for(key: &Key, context: &KeyContext) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Named(NamedKey::F12) => Some(KeyAction::Capture),
        Key::Named(NamedKey::Tab) => Some(KeyAction::Apply(Command::SetActiveEffect(context.active.next()))),
        Key::Character(text) => {
            let lower = text.to_lowercase();
            match lower.as_str() {
                "1" | "2" | "3" | "4" | "5" | "6" | "7" => {
                    let index = lower.parse::<usize>().ok()? - 1;
                    let kind = *EffectKind::all().get(index)?;
                    Some(KeyAction::Apply(Command::SetActiveEffect(kind)))
                }
                "b" => Some(toggle(context.post, PostEffect::Bloom)),
                "g" => Some(toggle(context.post, PostEffect::Grain)),
                "c" => Some(toggle(context.post, PostEffect::Chromatic)),
                "s" => Some(toggle(context.post, PostEffect::Scanlines)),
                "v" => Some(toggle(context.post, PostEffect::Vignette)),
                "r" => Some(toggle(context.post, PostEffect::Crt)),
                "p" => Some(toggle(context.post, PostEffect::Phosphor)),
                "q" => {
                    let next = context.ascii.quality.next();
                    Some(ascii_option("quality", serde_json::to_value(next).ok()?))
                }
                "[" => {
                    let size = (context.ascii.cell_size - CELL_SIZE_STEP).max(MIN_CELL_SIZE);
                    Some(ascii_option("cell_size", size.into()))
                }
                "]" => {
                    let size = (context.ascii.cell_size + CELL_SIZE_STEP).min(MAX_CELL_SIZE);
                    Some(ascii_option("cell_size", size.into()))
                }
                "t" => Some(KeyAction::ExportText),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fx_core::MatchQuality;
    use serde_json::json;

    fn press(key: &str, post: &PostProcessOptions, ascii: &AsciiOptions) -> Option<KeyAction> {
        let context = KeyContext {
            active: EffectKind::Ascii,
            post,
            ascii,
        };
        action_for(&Key::Character(key.into()), &context)
    }

    #[test]
    fn digits_select_effects_in_table_order() {
        let post = PostProcessOptions::default();
        let ascii = AsciiOptions::default();
        assert_eq!(
            press("1", &post, &ascii),
            Some(KeyAction::Apply(Command::SetActiveEffect(EffectKind::Ascii)))
        );
        assert_eq!(
            press("7", &post, &ascii),
            Some(KeyAction::Apply(Command::SetActiveEffect(EffectKind::Vhs)))
        );
        assert_eq!(press("8", &post, &ascii), None);
    }

    #[test]
    fn toggles_flip_the_current_state() {
        let mut post = PostProcessOptions::default();
        let ascii = AsciiOptions::default();
        let on = Command::set_option(OptionTarget::PostProcess, "bloom.enabled", true);
        assert_eq!(press("B", &post, &ascii), Some(KeyAction::Apply(on)));

        post.bloom.enabled = true;
        let off = Command::set_option(OptionTarget::PostProcess, "bloom.enabled", false);
        assert_eq!(press("b", &post, &ascii), Some(KeyAction::Apply(off)));
    }

    #[test]
    fn quality_cycles_and_cell_size_clamps() {
        let post = PostProcessOptions::default();
        let mut ascii = AsciiOptions {
            quality: MatchQuality::Quality,
            cell_size: MIN_CELL_SIZE,
            ..AsciiOptions::default()
        };
        assert_eq!(press("q", &post, &ascii), Some(ascii_option("quality", json!("fast"))));
        assert_eq!(
            press("[", &post, &ascii),
            Some(ascii_option("cell_size", json!(MIN_CELL_SIZE)))
        );

        ascii.cell_size = MAX_CELL_SIZE;
        assert_eq!(
            press("]", &post, &ascii),
            Some(ascii_option("cell_size", json!(MAX_CELL_SIZE)))
        );
    }

    #[test]
    fn named_keys() {
        let post = PostProcessOptions::default();
        let ascii = AsciiOptions::default();
        let context = KeyContext {
            active: EffectKind::Vhs,
            post: &post,
            ascii: &ascii,
        };
        assert_eq!(action_for(&Key::Named(NamedKey::Escape), &context), Some(KeyAction::Quit));
        assert_eq!(action_for(&Key::Named(NamedKey::F12), &context), Some(KeyAction::Capture));
        assert_eq!(action_for(&Key::Named(NamedKey::Space), &context), None);
    }

    #[test]
    fn tab_cycles_to_the_next_effect() {
        let post = PostProcessOptions::default();
        let ascii = AsciiOptions::default();
        let mut context = KeyContext {
            active: EffectKind::Ascii,
            post: &post,
            ascii: &ascii,
        };
        let tab = Key::Named(NamedKey::Tab);
        assert_eq!(
            action_for(&tab, &context),
            Some(KeyAction::Apply(Command::SetActiveEffect(EffectKind::Halftone)))
        );
        context.active = EffectKind::Vhs;
        assert_eq!(
            action_for(&tab, &context),
            Some(KeyAction::Apply(Command::SetActiveEffect(EffectKind::Ascii)))
        );
    }
}
