//! Localized strings for fixed bot replies.
//!
//! Uses a simple `t(key, lang)` function for static strings and
//! `format_*()` helpers for strings with interpolation.
//! Supported languages: Traditional Chinese (`zh-TW`, default) and
//! English (fallback).

#[cfg(test)]
mod tests;

/// Return a localized static string for `key` in the given `lang`.
/// Falls back to English for unsupported languages and to `"???"` for
/// unknown keys.
pub fn t(key: &str, lang: &str) -> &'static str {
    let zh = is_traditional_chinese(lang);
    match key {
        "prompt_updated" => {
            if zh {
                "✅ 系統提示詞已更新！"
            } else {
                "✅ System prompt updated!"
            }
        }
        "prompt_cleared" => {
            if zh {
                "✅ 已清除使用者提示詞，恢復為預設提示詞。"
            } else {
                "✅ Your custom prompt was cleared. The default prompt is back in use."
            }
        }
        "prompt_not_set" => {
            if zh {
                "ℹ️ 你尚未自訂提示詞，已使用預設提示詞。"
            } else {
                "ℹ️ You have no custom prompt. The default prompt is in use."
            }
        }
        "history_cleared" => {
            if zh {
                "🗑️ 已清除你的聊天紀錄，從頭開始囉！"
            } else {
                "🗑️ Your chat history was cleared. Let's start over!"
            }
        }
        "completion_failed" => {
            if zh {
                "抱歉朋友，我現在遇到了一些技術問題，請稍後再試試看 🙏"
            } else {
                "Sorry, I ran into a technical problem. Please try again later 🙏"
            }
        }
        "empty_completion" => {
            if zh {
                "抱歉，我暫時無法回應。"
            } else {
                "Sorry, I can't respond right now."
            }
        }
        "storage_failed" => {
            if zh {
                "抱歉朋友，我遇到了一些問題，請稍後再試試看 🙏"
            } else {
                "Sorry, something went wrong. Please try again later 🙏"
            }
        }
        "describe_image" => {
            if zh {
                "請詳細描述這張圖片的內容。如果圖片中有文字，也請一併列出。"
            } else {
                "Describe this image in detail. If it contains any text, list that text too."
            }
        }
        "image_failed" => {
            if zh {
                "抱歉，處理圖片時發生了一點問題。"
            } else {
                "Sorry, something went wrong while processing your image."
            }
        }
        "image_missing" => {
            if zh {
                "(圖片已遺失)"
            } else {
                "(image no longer available)"
            }
        }
        "server_running" => {
            if zh {
                "聊天機器人正常運作"
            } else {
                "Chatbot is running"
            }
        }
        "help" => {
            if zh {
                HELP_ZH
            } else {
                HELP_EN
            }
        }
        _ => "???",
    }
}

/// Format the prompt shown when entering the set-prompt flow.
pub fn format_prompt_show(lang: &str, prompt: &str) -> String {
    if is_traditional_chinese(lang) {
        format!("🔧 現在的提示詞如下：\n\n{prompt}\n\n請輸入你想要變更的新提示詞：")
    } else {
        format!("🔧 Your current prompt is:\n\n{prompt}\n\nSend the new prompt you want to use:")
    }
}

fn is_traditional_chinese(lang: &str) -> bool {
    matches!(
        lang.to_ascii_lowercase().as_str(),
        "zh-tw" | "zh_tw" | "zh-hant" | "traditional chinese"
    )
}

const HELP_ZH: &str = "嗨朋友！我是你的AI小助手 🤖

我可以幫你：
• 回答各種問題
• 提供建議和協助
• 進行日常聊天
• 描述你傳來的圖片

特殊指令：
• 發送「設定提示詞」自訂我的說話風格
• 發送「清除提示詞」恢復預設風格
• 發送「清除記憶」重新開始對話
• 發送「幫助」查看此說明

有什麼想聊的嗎？我隨時都在！ 😊";

const HELP_EN: &str = "Hi there! I'm your AI assistant 🤖

I can:
• Answer all kinds of questions
• Offer suggestions and help
• Chat about your day
• Describe images you send

Commands:
• 設定提示詞: customize how I talk
• 清除提示詞: go back to the default style
• /reset or 清除記憶: start the conversation over
• /help or 幫助: show this message

What would you like to talk about? 😊";
