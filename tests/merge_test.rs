//! Merge-set and resolver properties over realistic datasets.

use std::collections::HashMap;

use mergemail::template::resolve;
use mergemail::{merge_records, BodyFormat, RecipientRecord, Template, VariableMapping, Verdict};

fn dataset() -> Vec<RecipientRecord> {
    let rows = [
        (0, "ann@example.com", "Ann", "Oslo"),
        (1, "not an address", "Bo", "Lima"),
        (2, "cy@example.org", "Cy", "Kyiv"),
    ];
    rows.iter()
        .map(|(id, email, name, city)| {
            RecipientRecord::new(
                *id,
                HashMap::from([
                    ("email".to_string(), email.to_string()),
                    ("Name".to_string(), name.to_string()),
                    ("City".to_string(), city.to_string()),
                ]),
            )
        })
        .collect()
}

#[test]
fn fully_bound_templates_render_without_tokens() {
    let template = Template::new(
        "{{Name}}, your {{City}} update",
        "Hi {{Name}}, news from {{City}}.",
        BodyFormat::Text,
    );
    let mapping = VariableMapping::new().map("Name", "Name").map("City", "City");

    for merged in merge_records(&template, &mapping, &dataset(), "email") {
        assert!(!merged.subject.contains("{{"), "subject: {}", merged.subject);
        assert!(!merged.body.contains("{{"), "body: {}", merged.body);
    }
}

#[test]
fn every_record_appears_in_the_merge_set() {
    let template = Template::new("s", "b", BodyFormat::Text);
    let records = dataset();
    let set = merge_records(&template, &VariableMapping::new(), &records, "email");

    assert_eq!(set.len(), records.len());
    let ids: Vec<usize> = set.iter().map(|m| m.recipient_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(set[1].verdict, Verdict::InvalidAddress);
}

#[test]
fn merge_output_is_byte_identical_across_runs() {
    let template = Template::new("Hi {{Name}}", "{{City}} news: {{Unmapped}}", BodyFormat::Html);
    let mapping = VariableMapping::new()
        .map("Name", "Name")
        .map("City", "City")
        .map("Unmapped", "NoSuchColumn");
    let records = dataset();

    let a = merge_records(&template, &mapping, &records, "email");
    let b = merge_records(&template, &mapping, &records, "email");
    assert_eq!(a, b);
}

#[test]
fn spec_example_ann_and_bo() {
    let template = Template::new("Hi {{Name}}", "Hello {{Name}}!", BodyFormat::Text);
    let mapping = VariableMapping::new().map("Name", "Name");
    let records = vec![
        RecipientRecord::new(
            1,
            HashMap::from([
                ("email".to_string(), "a@x.com".to_string()),
                ("Name".to_string(), "Ann".to_string()),
            ]),
        ),
        RecipientRecord::new(
            2,
            HashMap::from([
                ("email".to_string(), "bad-email".to_string()),
                ("Name".to_string(), "Bo".to_string()),
            ]),
        ),
    ];

    let set = merge_records(&template, &mapping, &records, "email");
    assert_eq!(set[0].subject, "Hi Ann");
    assert_eq!(set[0].body, "Hello Ann!");
    assert_eq!(set[0].verdict, Verdict::Valid);
    assert_eq!(set[1].verdict, Verdict::InvalidAddress);
}

#[test]
fn resolver_reports_missing_keys_without_failing_render() {
    let bindings = HashMap::from([("Name".to_string(), "Ann".to_string())]);
    let out = resolve("Hi {{Name}}, balance: {{Balance}}", &bindings);
    assert_eq!(out.text, "Hi Ann, balance: {{Balance}}");
    assert_eq!(out.missing, vec!["Balance"]);
}
