//! Shared types passed between the store, the renderer and the batch runner.
//!
//! [`Version`] is also the on-disk ledger schema, so field names here are
//! the JSON keys. Legacy ledgers wrote the contact id as `wxid`; that key is
//! accepted as an alias on load.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of a contact at the time a version was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRef {
    /// Stable contact identifier. Also the ledger and image file stem.
    #[serde(alias = "wxid", default)]
    pub id: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    /// Raw avatar bytes. `None` (no avatar) is distinct from an empty avatar.
    #[serde(
        default,
        with = "crate::codec::optional_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Vec<u8>>,
}

impl ContactRef {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar: None,
        }
    }
}

/// Tone used when requesting greeting text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Formal,
    Warm,
    Humor,
    Literary,
    Custom,
}

impl Style {
    pub const PRESETS: [Style; 4] = [Style::Formal, Style::Warm, Style::Humor, Style::Literary];

    /// Canonical prompt text for preset styles; `None` for [`Style::Custom`].
    pub fn preset_text(self) -> Option<&'static str> {
        match self {
            Style::Formal => Some("正式、庄重、专业的新年祝福，使用恰当的敬语和礼貌用语"),
            Style::Warm => Some("温暖、亲切、感人的新年祝福，表达真挚的关心和美好祝愿"),
            Style::Humor => Some("幽默、轻松、有趣的新年祝福，让人会心一笑"),
            Style::Literary => Some("文艺、优美、富有诗意的新年祝福，使用优美的文学语言"),
            Style::Custom => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Formal => "formal",
            Style::Warm => "warm",
            Style::Humor => "humor",
            Style::Literary => "literary",
            Style::Custom => "custom",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four text fields returned by the greeting generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreetingText {
    pub greeting: String,
    pub poem: String,
    pub idioms: String,
    pub wishes: String,
}

/// One generated-content record in a contact's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Assigned by the store on append; `0` means "not yet assigned".
    #[serde(default)]
    pub version_number: u32,
    /// Local time, `%Y-%m-%d %H:%M:%S`. Empty until the store fills it in.
    #[serde(default)]
    pub create_time: String,
    pub style: Style,
    /// The prompt text actually used: the preset text, or the custom text.
    #[serde(default)]
    pub style_content: String,
    /// Only present on custom-style versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    pub contact: ContactRef,
    #[serde(default)]
    pub greeting: String,
    #[serde(default)]
    pub poem: String,
    #[serde(default)]
    pub idioms: String,
    #[serde(default)]
    pub wishes: String,
    #[serde(default)]
    pub template_number: u32,
    #[serde(default)]
    pub image_path: String,
}

impl Version {
    /// A fresh, unnumbered version for `contact`.
    pub fn new(contact: ContactRef, style: Style, text: GreetingText) -> Self {
        Self {
            version_number: 0,
            create_time: String::new(),
            style,
            style_content: String::new(),
            custom_prompt: None,
            contact,
            greeting: text.greeting,
            poem: text.poem,
            idioms: text.idioms,
            wishes: text.wishes,
            template_number: 1,
            image_path: String::new(),
        }
    }

    /// Bring `style_content` and `custom_prompt` in line with `style`.
    ///
    /// Custom versions take their content from `custom_prompt` (empty when
    /// none was given). Preset versions take the canonical preset text and
    /// drop any leftover custom prompt.
    pub fn normalize_style(&mut self) {
        match self.style.preset_text() {
            Some(preset) => {
                self.style_content = preset.to_string();
                self.custom_prompt = None;
            }
            None => {
                let prompt = self.custom_prompt.take().unwrap_or_default();
                self.style_content = prompt.clone();
                self.custom_prompt = Some(prompt);
            }
        }
    }

    pub fn text(&self) -> GreetingText {
        GreetingText {
            greeting: self.greeting.clone(),
            poem: self.poem.clone(),
            idioms: self.idioms.clone(),
            wishes: self.wishes.clone(),
        }
    }
}

/// A chat message as returned by the chat-history source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    pub is_sender: bool,
    pub create_time: String,
}

/// What the delivery layer needs to send a finished card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub contact_display_name: String,
    pub image_path: String,
}
