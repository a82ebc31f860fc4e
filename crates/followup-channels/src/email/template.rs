//! Reminder email rendering.
//!
//! Output depends only on the record and recipient. Optional fields that are
//! absent are left out entirely rather than rendered as empty rows.

use followup_core::record::{ApplicationRecord, Recipient};

/// A rendered reminder email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn render(record: &ApplicationRecord, recipient: &Recipient) -> ReminderEmail {
    let subject = format!(
        "Reminder: Follow up on your {} application at {}",
        record.position, record.company
    );
    let applied = record.applied_date.format("%Y-%m-%d").to_string();
    let greeting = recipient.greeting_name();

    let mut html = String::new();
    html.push_str("<div style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">\n");
    html.push_str("<h2>Job Application Reminder</h2>\n");
    html.push_str(&format!("<p>Hello {},</p>\n", escape_html(greeting)));
    html.push_str("<p>This is a reminder to follow up on your job application:</p>\n");
    html.push_str(
        "<div style=\"padding: 15px; border-left: 4px solid #3b82f6; \
         background-color: #f9fafb; margin: 20px 0;\">\n",
    );
    html.push_str(&row("Position", &escape_html(&record.position)));
    html.push_str(&row("Company", &escape_html(&record.company)));
    html.push_str(&row("Status", record.status.label()));
    html.push_str(&row("Applied Date", &applied));
    if let Some(url) = record.url() {
        let url = escape_html(url);
        html.push_str(&row("Job URL", &format!("<a href=\"{url}\">{url}</a>")));
    }
    if let Some(name) = record.contact_name() {
        html.push_str(&row("Contact", &escape_html(name)));
    }
    if let Some(email) = record.contact_email() {
        let email = escape_html(email);
        html.push_str(&row(
            "Contact Email",
            &format!("<a href=\"mailto:{email}\">{email}</a>"),
        ));
    }
    html.push_str("</div>\n");
    if let Some(notes) = record.notes() {
        html.push_str(&row("Notes", &escape_html(notes)));
    }
    html.push_str("<p>Good luck with your job search!</p>\n");
    html.push_str("<p>Your Job Tracker</p>\n");
    html.push_str("<hr />\n");
    html.push_str(
        "<p style=\"font-size: 12px; color: #6b7280;\">\
         This is an automated reminder from your Job Application Tracker.</p>\n",
    );
    html.push_str("</div>\n");

    let mut text = String::new();
    text.push_str(&format!("Hello {greeting},\n\n"));
    text.push_str("This is a reminder to follow up on your job application:\n\n");
    text.push_str(&format!("Position: {}\n", record.position));
    text.push_str(&format!("Company: {}\n", record.company));
    text.push_str(&format!("Status: {}\n", record.status.label()));
    text.push_str(&format!("Applied Date: {applied}\n"));
    if let Some(url) = record.url() {
        text.push_str(&format!("Job URL: {url}\n"));
    }
    if let Some(name) = record.contact_name() {
        text.push_str(&format!("Contact: {name}\n"));
    }
    if let Some(email) = record.contact_email() {
        text.push_str(&format!("Contact Email: {email}\n"));
    }
    if let Some(notes) = record.notes() {
        text.push_str(&format!("\nNotes: {notes}\n"));
    }
    text.push_str("\nGood luck with your job search!\nYour Job Tracker\n");

    ReminderEmail {
        subject,
        html,
        text,
    }
}

fn row(label: &str, value: &str) -> String {
    format!("<p><strong>{label}:</strong> {value}</p>\n")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use followup_core::record::ApplicationStatus;

    fn record() -> ApplicationRecord {
        let applied = Utc.with_ymd_and_hms(2023, 12, 5, 15, 30, 0).unwrap();
        ApplicationRecord {
            id: "A".into(),
            owner_id: "u".into(),
            company: "Acme & Sons".into(),
            position: "Engineer".into(),
            location: None,
            status: ApplicationStatus::Interview,
            applied_date: applied,
            notes: None,
            url: None,
            contact_name: None,
            contact_email: None,
            reminder: None,
            reminder_sent: false,
            created_at: applied,
            updated_at: applied,
        }
    }

    fn recipient(name: Option<&str>) -> Recipient {
        Recipient {
            email: "ada@example.test".into(),
            name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_subject_and_required_fields() {
        let email = render(&record(), &recipient(Some("Ada")));
        assert_eq!(
            email.subject,
            "Reminder: Follow up on your Engineer application at Acme & Sons"
        );
        assert!(email.html.contains("<p>Hello Ada,</p>"));
        assert!(email.html.contains("<strong>Company:</strong> Acme &amp; Sons"));
        assert!(email.html.contains("<strong>Status:</strong> Interview"));
        assert!(email.html.contains("<strong>Applied Date:</strong> 2023-12-05"));
        assert!(email.text.contains("Company: Acme & Sons\n"));
    }

    #[test]
    fn test_absent_optional_fields_are_omitted() {
        let email = render(
            &ApplicationRecord {
                notes: Some("   ".into()),
                ..record()
            },
            &recipient(None),
        );
        for label in ["Job URL", "Contact", "Contact Email", "Notes"] {
            assert!(!email.html.contains(&format!("{label}:")), "{label} leaked");
            assert!(!email.text.contains(&format!("{label}:")), "{label} leaked");
        }
        assert!(email.html.contains("<p>Hello there,</p>"));
    }

    #[test]
    fn test_present_optional_fields_are_rendered() {
        let email = render(
            &ApplicationRecord {
                url: Some("https://acme.test/jobs?id=1&src=x".into()),
                contact_name: Some("Grace".into()),
                contact_email: Some("grace@acme.test".into()),
                notes: Some("Mention the <Rust> project".into()),
                ..record()
            },
            &recipient(Some("Ada")),
        );
        assert!(email.html.contains(
            "<a href=\"https://acme.test/jobs?id=1&amp;src=x\">https://acme.test/jobs?id=1&amp;src=x</a>"
        ));
        assert!(email.html.contains("<strong>Contact:</strong> Grace"));
        assert!(email
            .html
            .contains("<a href=\"mailto:grace@acme.test\">grace@acme.test</a>"));
        assert!(email.html.contains("Mention the &lt;Rust&gt; project"));
        assert!(email.text.contains("Notes: Mention the <Rust> project"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let a = render(&record(), &recipient(Some("Ada")));
        let b = render(&record(), &recipient(Some("Ada")));
        assert_eq!(a, b);
    }
}
