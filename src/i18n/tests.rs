use super::*;

const KEYS: [&str; 12] = [
    "prompt_updated",
    "prompt_cleared",
    "prompt_not_set",
    "history_cleared",
    "completion_failed",
    "empty_completion",
    "storage_failed",
    "describe_image",
    "image_failed",
    "image_missing",
    "server_running",
    "help",
];

#[test]
fn test_all_keys_have_both_languages() {
    for key in KEYS {
        let zh = t(key, "zh-TW");
        let en = t(key, "English");
        assert_ne!(zh, "???", "missing zh-TW for {key}");
        assert_ne!(en, "???", "missing English for {key}");
        assert_ne!(zh, en, "{key} not localized");
    }
}

#[test]
fn test_unknown_key() {
    assert_eq!(t("nonexistent", "zh-TW"), "???");
}

#[test]
fn test_unsupported_language_falls_back_to_english() {
    assert_eq!(t("empty_completion", "Klingon"), "Sorry, I can't respond right now.");
}

#[test]
fn test_language_tag_is_case_insensitive() {
    assert_eq!(t("empty_completion", "ZH-tw"), "抱歉，我暫時無法回應。");
}

#[test]
fn test_format_prompt_show_embeds_prompt() {
    let s = format_prompt_show("zh-TW", "你是海盜。");
    assert!(s.starts_with("🔧 現在的提示詞如下："));
    assert!(s.contains("\n\n你是海盜。\n\n"));
    assert!(format_prompt_show("English", "Be a pirate.").contains("Be a pirate."));
}

#[test]
fn test_help_lists_commands() {
    let help = t("help", "zh-TW");
    for cmd in ["設定提示詞", "清除提示詞", "清除記憶", "幫助"] {
        assert!(help.contains(cmd), "help missing {cmd}");
    }
}
