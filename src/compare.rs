//! Field-by-field comparison of two versions.

use crate::types::Version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: String,
    pub after: String,
}

/// Fields of `a` and `b` that differ, in display order.
///
/// Compares style, style content, the four text fields, template number
/// and image path; numbering, timestamps and the contact snapshot are not
/// part of the comparison.
pub fn compare(a: &Version, b: &Version) -> Vec<FieldChange> {
    let fields: [(&'static str, String, String); 8] = [
        ("style", a.style.to_string(), b.style.to_string()),
        ("style_content", a.style_content.clone(), b.style_content.clone()),
        ("greeting", a.greeting.clone(), b.greeting.clone()),
        ("poem", a.poem.clone(), b.poem.clone()),
        ("idioms", a.idioms.clone(), b.idioms.clone()),
        ("wishes", a.wishes.clone(), b.wishes.clone()),
        (
            "template_number",
            a.template_number.to_string(),
            b.template_number.to_string(),
        ),
        ("image_path", a.image_path.clone(), b.image_path.clone()),
    ];
    fields
        .into_iter()
        .filter(|(_, before, after)| before != after)
        .map(|(field, before, after)| FieldChange {
            field,
            before,
            after,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_version;
    use crate::types::Style;

    #[test]
    fn identical_versions_have_no_changes() {
        let v = sample_version("w1", "Alice");
        assert!(compare(&v, &v.clone()).is_empty());
    }

    #[test]
    fn numbering_and_time_are_ignored() {
        let a = sample_version("w1", "Alice");
        let mut b = a.clone();
        b.version_number = 7;
        b.create_time = "2025-01-29 08:00:00".into();
        b.contact.display_name = "Alice Chen".into();
        assert!(compare(&a, &b).is_empty());
    }

    #[test]
    fn reports_changed_fields_in_order() {
        let mut a = sample_version("w1", "Alice");
        a.normalize_style();
        let mut b = a.clone();
        b.style = Style::Humor;
        b.normalize_style();
        b.wishes = "天天开心".into();
        b.template_number = 2;

        let changes = compare(&a, &b);

        let fields: Vec<&str> = changes.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec!["style", "style_content", "wishes", "template_number"]);
        assert_eq!(changes[0].before, "formal");
        assert_eq!(changes[0].after, "humor");
        assert_eq!(changes[2].after, "天天开心");
        assert_eq!(changes[3].before, "1");
    }
}
