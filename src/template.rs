//! Placeholder substitution for card templates.
//!
//! A template is an HTML document with `{name}` placeholders. Templates are
//! looked up by number as `<template_dir>/template_<n>.html` and read, never
//! written.
//!
//! | Placeholder | Value |
//! |---|---|
//! | `{year}` | year |
//! | `{greeting_text}` | main greeting line |
//! | `{idioms_text_1}`, `{idioms_text_2}` | the two poem lines |
//! | `{tag_1}` … `{tag_3}` | the three idioms |
//! | `{wishes_text}` | wishes paragraph |
//! | `{signature}` | signature |
//!
//! The poem and idiom fields arrive as single comma-separated strings. The
//! poem always yields two lines (a one-line poem is used twice) and the
//! idioms always yield three tags (the last one repeats). Values are
//! substituted verbatim, without HTML escaping. Any other `{...}` text in the
//! template is left as it is.

use maud::{DOCTYPE, PreEscaped, html};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const DEFAULT_GREETING: &str = "新年快乐";
const DEFAULT_POEM: &str = "梦想飞扬似朝阳,岁岁安康伴春寒";
const DEFAULT_IDIOMS: &str = "福满人间,万事胜意,喜乐安康";
const DEFAULT_WISHES: &str = "愿你在新的一年里\n事事顺遂 万事胜意";
const DEFAULT_SIGNATURE: &str = "署名";

/// Text to inject. Absent fields fall back to built-in phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateData {
    pub year: Option<String>,
    pub greeting_text: Option<String>,
    pub poem_text: Option<String>,
    pub idioms_text: Option<String>,
    pub wishes_text: Option<String>,
    pub signature: Option<String>,
}

impl TemplateData {
    /// Fill every absent field with its fallback.
    pub fn resolve(&self) -> ResolvedData {
        let or = |value: &Option<String>, fallback: &str| {
            value.clone().unwrap_or_else(|| fallback.to_string())
        };
        ResolvedData {
            year: self
                .year
                .clone()
                .unwrap_or_else(|| chrono::Local::now().format("%Y").to_string()),
            greeting_text: or(&self.greeting_text, DEFAULT_GREETING),
            poem_text: or(&self.poem_text, DEFAULT_POEM),
            idioms_text: or(&self.idioms_text, DEFAULT_IDIOMS),
            wishes_text: or(&self.wishes_text, DEFAULT_WISHES),
            signature: or(&self.signature, DEFAULT_SIGNATURE),
        }
    }
}

/// Template text with every field present. This is also what the generation
/// record stores as `template_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedData {
    pub year: String,
    pub greeting_text: String,
    pub poem_text: String,
    pub idioms_text: String,
    pub wishes_text: String,
    pub signature: String,
}

impl ResolvedData {
    /// The poem as exactly two lines.
    pub fn poem_lines(&self) -> [String; 2] {
        let parts: Vec<&str> = self.poem_text.split(',').collect();
        let first = parts[0];
        let second = parts.get(1).copied().unwrap_or(first);
        [first.to_string(), second.to_string()]
    }

    /// The idioms as exactly three tags, repeating the last one as needed.
    pub fn idiom_tags(&self) -> [String; 3] {
        let parts: Vec<&str> = self.idioms_text.split(',').collect();
        let at = |i: usize| parts.get(i).or(parts.last()).copied().unwrap_or_default();
        [at(0).to_string(), at(1).to_string(), at(2).to_string()]
    }

    /// `(placeholder name, value)` pairs in substitution order.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        let [line_1, line_2] = self.poem_lines();
        let [tag_1, tag_2, tag_3] = self.idiom_tags();
        vec![
            ("year", self.year.clone()),
            ("greeting_text", self.greeting_text.clone()),
            ("idioms_text_1", line_1),
            ("idioms_text_2", line_2),
            ("wishes_text", self.wishes_text.clone()),
            ("signature", self.signature.clone()),
            ("tag_1", tag_1),
            ("tag_2", tag_2),
            ("tag_3", tag_3),
        ]
    }
}

/// Path of template `number` inside `template_dir`.
pub fn template_path(template_dir: &Path, number: u32) -> PathBuf {
    template_dir.join(format!("template_{number}.html"))
}

/// Substitute every known placeholder in `template`.
pub fn inject(template: &str, data: &ResolvedData) -> String {
    data.placeholders()
        .into_iter()
        .fold(template.to_string(), |html, (name, value)| {
            html.replace(&format!("{{{name}}}"), &value)
        })
}

/// Read `template_path`, inject `data`, and write the document to `out_path`.
///
/// Returns `out_path`. The caller owns the written file.
pub fn inject_file(
    template_path: &Path,
    data: &ResolvedData,
    out_path: &Path,
) -> Result<PathBuf, TemplateError> {
    if !template_path.is_file() {
        return Err(TemplateError::NotFound(template_path.to_path_buf()));
    }
    let template = fs::read_to_string(template_path)?;
    fs::write(out_path, inject(&template, data))?;
    Ok(out_path.to_path_buf())
}

const STOCK_CSS: &str = r#"
body { margin: 0; background: #f3efe6; font-family: "Noto Serif SC", "Songti SC", serif; }
.card-container {
  width: 600px; margin: 60px auto; padding: 48px 56px; box-sizing: border-box;
  background: #b3202a; color: #fbe8c8; border-radius: 16px; text-align: center;
}
.year { font-size: 20px; letter-spacing: 0.4em; opacity: 0.8; }
.greeting { font-size: 44px; margin: 16px 0 28px; }
.poem p { font-size: 22px; margin: 6px 0; }
.tags { list-style: none; padding: 0; margin: 28px 0; display: flex; justify-content: center; gap: 12px; }
.tags li { border: 1px solid #fbe8c8; border-radius: 4px; padding: 4px 10px; }
.wishes { font-size: 18px; line-height: 1.8; white-space: pre-line; }
.signature { text-align: right; margin-top: 32px; }
"#;

/// A self-contained starter template using every placeholder.
///
/// Printed by `greetcard gen-template`; save it as `template_1.html`.
pub fn stock_template() -> String {
    let markup = html! {
        (DOCTYPE)
        html lang="zh-CN" {
            head {
                meta charset="utf-8";
                title { "{year} 新年贺卡" }
                style { (PreEscaped(STOCK_CSS)) }
            }
            body {
                div class="card-container" {
                    div class="year" { "{year}" }
                    h1 class="greeting" { "{greeting_text}" }
                    div class="poem" {
                        p { "{idioms_text_1}" }
                        p { "{idioms_text_2}" }
                    }
                    ul class="tags" {
                        li { "{tag_1}" }
                        li { "{tag_2}" }
                        li { "{tag_3}" }
                    }
                    p class="wishes" { "{wishes_text}" }
                    p class="signature" { "{signature}" }
                }
            }
        }
    };
    markup.into_string()
}
