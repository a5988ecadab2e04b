//! `review` callback: email the plate report to the person named on the sign.

use async_trait::async_trait;
use colonylab_core::callback::{Callback, CallbackInvocation, CallbackKind, CallbackOutcome};
use colonylab_core::error::CallbackError;
use colonylab_database::{Database, fuzzy_find_team_member};
use handlebars::Handlebars;
use std::sync::Arc;
use tracing::{info, warn};

use crate::mailer::{Email, Mailer};

const REVIEW_SUBJECT: &str = "A new review request has been assigned to you";

const REVIEW_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Review Request</title>
</head>
<body>
    <div class="container">
        <h2>Review Request</h2>
        <p>Hello{{#if name}} {{name}}{{/if}},</p>
        <div class="content">
            <p>We are reaching out to request your review of a recent plate analysis. Your feedback helps us keep our results reliable.</p>
            <pre style="white-space: pre-wrap; font-family: inherit;">{{data}}</pre>
            <p>If you have any questions or need further information, please let us know.</p>
        </div>
        <div class="footer">
            Best regards,<br>
            The Team
        </div>
    </div>
</body>
</html>
"#;

/// Sender and routing for review emails.
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub from: String,
    /// Used when the sign names nobody we can match
    pub fallback_to: Option<String>,
    pub cc: Vec<String>,
}

pub struct ReviewCallback {
    mailer: Arc<dyn Mailer>,
    directory: Option<Arc<dyn Database>>,
    settings: ReviewSettings,
    templates: Handlebars<'static>,
}

impl ReviewCallback {
    pub fn new(mailer: Arc<dyn Mailer>, settings: ReviewSettings) -> Result<Self, CallbackError> {
        let mut templates = Handlebars::new();
        templates
            .register_template_string("review", REVIEW_TEMPLATE)
            .map_err(|e| CallbackError::Delivery(format!("Review template: {e}")))?;

        Ok(Self {
            mailer,
            directory: None,
            settings,
            templates,
        })
    }

    /// Look team members up in `db` to route the email.
    pub fn with_directory(mut self, db: Arc<dyn Database>) -> Self {
        self.directory = Some(db);
        self
    }

    /// The reviewer name written on the sign (`Name: ...`, any key casing).
    fn reviewer_name(invocation: &CallbackInvocation) -> Option<&str> {
        invocation
            .parameters
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("name"))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Resolve the recipient: matched member email, else the fallback.
    async fn recipient(&self, name: Option<&str>) -> Result<(String, Option<String>), CallbackError> {
        let matched = match (name, &self.directory) {
            (Some(name), Some(db)) => fuzzy_find_team_member(db.as_ref(), name)
                .await
                .map_err(|e| CallbackError::Lookup(e.to_string()))?,
            (Some(_), None) => {
                warn!("No team directory configured, using fallback reviewer");
                None
            }
            (None, _) => None,
        };

        match matched {
            Some(member) => match member.email {
                Some(email) if !email.trim().is_empty() => Ok((email, Some(member.username))),
                _ => self.fallback(Some(member.username)),
            },
            None => self.fallback(None),
        }
    }

    fn fallback(&self, username: Option<String>) -> Result<(String, Option<String>), CallbackError> {
        self.settings
            .fallback_to
            .clone()
            .map(|to| (to, username))
            .ok_or_else(|| {
                CallbackError::InvalidParameters(
                    "No matching team member and no fallback reviewer configured".into(),
                )
            })
    }

    fn render(&self, name: Option<&str>, data: &str) -> Result<String, CallbackError> {
        self.templates
            .render(
                "review",
                &serde_json::json!({ "name": name, "data": data }),
            )
            .map_err(|e| CallbackError::Delivery(format!("Review template: {e}")))
    }
}

#[async_trait]
impl Callback for ReviewCallback {
    fn kind(&self) -> CallbackKind {
        CallbackKind::Review
    }

    async fn execute(&self, invocation: CallbackInvocation) -> Result<CallbackOutcome, CallbackError> {
        let name = Self::reviewer_name(&invocation);
        let (to, username) = self.recipient(name).await?;

        let email = Email {
            from: self.settings.from.clone(),
            to: vec![to.clone()],
            cc: self.settings.cc.clone(),
            subject: REVIEW_SUBJECT.into(),
            html: self.render(username.as_deref().or(name), &invocation.data)?,
        };
        let message_id = self.mailer.send(&email).await?;

        info!(recipient = %to, matched = ?username, %message_id, "Review request sent");
        Ok(CallbackOutcome {
            name: CallbackKind::Review,
            data: serde_json::json!({
                "recipient": to,
                "matched_user": username,
                "message_id": message_id,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colonylab_core::error::DatabaseError;
    use colonylab_database::Row;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> Result<String, CallbackError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok("msg_1".into())
        }
    }

    struct Team;

    #[async_trait]
    impl Database for Team {
        async fn query(&self, _sql: &str) -> Result<Vec<Row>, DatabaseError> {
            let rows = serde_json::json!([
                {"username": "marie", "email": "marie@lab.org"},
                {"username": "louis", "email": "louis@lab.org"},
                {"username": "rosalind", "email": null}
            ]);
            Ok(rows
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r.as_object().unwrap().clone())
                .collect())
        }
    }

    fn settings(fallback: Option<&str>) -> ReviewSettings {
        ReviewSettings {
            from: "Laboratory <lab@example.com>".into(),
            fallback_to: fallback.map(String::from),
            cc: vec!["head@lab.org".into()],
        }
    }

    fn invocation(name: Option<&str>, data: &str) -> CallbackInvocation {
        let mut parameters = BTreeMap::new();
        if let Some(name) = name {
            parameters.insert("Name".to_string(), name.to_string());
        }
        CallbackInvocation {
            parameters,
            data: data.into(),
        }
    }

    #[tokio::test]
    async fn sends_to_fuzzy_matched_member() {
        let mailer = Arc::new(RecordingMailer::default());
        let callback = ReviewCallback::new(mailer.clone(), settings(Some("lab@example.com")))
            .unwrap()
            .with_directory(Arc::new(Team));

        let outcome = callback
            .execute(invocation(Some("Lois"), "# Plate report"))
            .await
            .unwrap();
        assert_eq!(outcome.name, CallbackKind::Review);
        assert_eq!(outcome.data["recipient"], "louis@lab.org");
        assert_eq!(outcome.data["matched_user"], "louis");

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["louis@lab.org"]);
        assert_eq!(sent[0].cc, vec!["head@lab.org"]);
        assert_eq!(sent[0].subject, REVIEW_SUBJECT);
        assert!(sent[0].html.contains("# Plate report"));
        assert!(sent[0].html.contains("Hello louis,"));
    }

    #[tokio::test]
    async fn report_html_is_escaped() {
        let mailer = Arc::new(RecordingMailer::default());
        let callback = ReviewCallback::new(mailer.clone(), settings(Some("lab@example.com"))).unwrap();

        callback
            .execute(invocation(None, "<script>alert(1)</script>"))
            .await
            .unwrap();
        let sent = mailer.sent.lock().unwrap();
        let html = &sent[0].html;
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[tokio::test]
    async fn member_without_email_goes_to_fallback() {
        let mailer = Arc::new(RecordingMailer::default());
        let callback = ReviewCallback::new(mailer.clone(), settings(Some("lab@example.com")))
            .unwrap()
            .with_directory(Arc::new(Team));

        let outcome = callback.execute(invocation(Some("Rosalind"), "r")).await.unwrap();
        assert_eq!(outcome.data["recipient"], "lab@example.com");
        assert_eq!(outcome.data["matched_user"], "rosalind");
    }

    #[tokio::test]
    async fn missing_name_without_fallback_fails() {
        let mailer = Arc::new(RecordingMailer::default());
        let callback = ReviewCallback::new(mailer.clone(), settings(None)).unwrap();

        let err = callback.execute(invocation(None, "r")).await.unwrap_err();
        assert!(matches!(err, CallbackError::InvalidParameters(_)));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn name_key_is_case_insensitive() {
        let mut inv = invocation(None, "");
        inv.parameters.insert(" NAME ".into(), "  ada ".into());
        assert_eq!(ReviewCallback::reviewer_name(&inv), Some("ada"));
    }
}
