//! Shared test utilities: sample records and template fixtures.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let templates = write_template(tmp.path(), 1, MINIMAL_TEMPLATE);
//! let version = sample_version("w1", "Alice");
//! ```

use crate::template::TemplateData;
use crate::types::{ContactRef, GreetingText, Style, Version};
use std::path::{Path, PathBuf};

/// A small template using every placeholder and a `.card-container`.
pub const MINIMAL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="card-container">
  <h1>{year} {greeting_text}</h1>
  <p>{idioms_text_1}</p><p>{idioms_text_2}</p>
  <span>{tag_1}</span><span>{tag_2}</span><span>{tag_3}</span>
  <p>{wishes_text}</p>
  <footer>{signature}</footer>
</div>
</body></html>
"#;

pub fn sample_contact(id: &str, name: &str) -> ContactRef {
    ContactRef::new(id, name)
}

pub fn sample_text() -> GreetingText {
    GreetingText {
        greeting: "新年快乐".into(),
        poem: "晴空万里映朝阳,岁岁平安人安康".into(),
        idioms: "福满人间,万事胜意,喜乐安康".into(),
        wishes: "愿你顺遂".into(),
    }
}

/// An unnumbered formal-style version, ready for `append`.
pub fn sample_version(id: &str, name: &str) -> Version {
    let mut v = Version::new(sample_contact(id, name), Style::Formal, sample_text());
    v.image_path = format!("generate_img/{id}.png");
    v
}

/// Template data matching the end-to-end scenario card.
pub fn scenario_data() -> TemplateData {
    TemplateData {
        year: Some("2025".into()),
        greeting_text: Some("Hi".into()),
        poem_text: Some("晴空万里映朝阳,岁岁平安人安康".into()),
        idioms_text: Some("福满人间,万事胜意,喜乐安康".into()),
        wishes_text: Some("愿你顺遂".into()),
        signature: Some("Alice".into()),
    }
}

/// Write `template_<number>.html` into `dir`, returning `dir`.
pub fn write_template(dir: &Path, number: u32, content: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("template_{number}.html")), content).unwrap();
    dir.to_path_buf()
}

/// File names directly inside `dir`, sorted. Empty if `dir` doesn't exist.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
