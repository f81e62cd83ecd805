use std::io::Write;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::text::strip_tags;

pub const DELETED_MESSAGE: &str =
    "The dataverse, dataset, or file for this notification has been deleted.";

pub type RawNotification = serde_json::Map<String, Value>;

#[derive(Debug, Deserialize)]
#[serde(try_from = "RawNotification")]
pub struct Notification {
    pub sent_timestamp: String,
    pub kind: NotificationKind,
}

/// One variant per notification type, each holding only what its message needs.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum NotificationKind {
    #[serde(rename = "ASSIGNROLE")]
    AssignRole(RoleChange),
    #[serde(rename = "REVOKEROLE")]
    RevokeRole(RoleChange),
    #[serde(rename = "CREATEDV")]
    CreateDataverse(CollectionCreated),
    #[serde(rename = "CREATEDS")]
    CreateDataset(DatasetCreated),
    #[serde(rename = "CREATEACC")]
    CreateAccount(AccountCreated),
    #[serde(rename = "SUBMITTEDDS")]
    SubmittedForReview(ReviewRequest),
    #[serde(rename = "RETURNEDDS")]
    ReturnedForRevision(DatasetInCollection),
    #[serde(rename = "PUBLISHEDDS")]
    Published(DatasetInCollection),
    #[serde(rename = "PUBLISHFAILED_PIDREG")]
    PublishFailedPidReg(DatasetInCollection),
    #[serde(rename = "REQUESTFILEACCESS")]
    RequestFileAccess(FileAccessRequest),
    #[serde(rename = "GRANTFILEACCESS")]
    GrantFileAccess(DatasetRef),
    #[serde(rename = "REJECTFILEACCESS")]
    RejectFileAccess(DatasetRef),
    #[serde(rename = "STATUSUPDATED")]
    StatusUpdated(StatusUpdate),
    /// Any type without a message of its own, or whose object is gone.
    #[serde(other)]
    Deleted,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataverseRef {
    pub dataverse_alias: String,
    pub dataverse_display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRef {
    pub owner_alias: String,
    pub owner_display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub dataset_persistent_identifier: String,
    pub dataset_display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requestor {
    pub requestor_first_name: String,
    pub requestor_last_name: String,
    pub requestor_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGuides {
    pub user_guides_base_url: String,
    pub user_guides_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub role_name: String,
    #[serde(flatten)]
    pub dataverse: DataverseRef,
}

#[derive(Debug, Deserialize)]
pub struct CollectionCreated {
    #[serde(flatten)]
    pub dataverse: DataverseRef,
    #[serde(flatten)]
    pub owner: OwnerRef,
    #[serde(flatten)]
    pub guides: UserGuides,
}

#[derive(Debug, Deserialize)]
pub struct DatasetCreated {
    #[serde(flatten)]
    pub dataset: DatasetRef,
    #[serde(flatten)]
    pub owner: OwnerRef,
    #[serde(flatten)]
    pub guides: UserGuides,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreated {
    pub installation_brand_name: String,
    #[serde(flatten)]
    pub guides: UserGuides,
}

#[derive(Debug, Deserialize)]
pub struct DatasetInCollection {
    #[serde(flatten)]
    pub dataset: DatasetRef,
    #[serde(flatten)]
    pub owner: OwnerRef,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    #[serde(flatten)]
    pub dataset: DatasetRef,
    #[serde(flatten)]
    pub owner: OwnerRef,
    #[serde(flatten)]
    pub requestor: Requestor,
}

#[derive(Debug, Deserialize)]
pub struct FileAccessRequest {
    #[serde(flatten)]
    pub dataset: DatasetRef,
    #[serde(flatten)]
    pub requestor: Requestor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    #[serde(flatten)]
    pub dataset: DatasetRef,
    pub current_curation_status: String,
}

impl TryFrom<RawNotification> for Notification {
    type Error = anyhow::Error;

    fn try_from(raw: RawNotification) -> Result<Self> {
        let sent_timestamp = raw
            .get("sentTimestamp")
            .context("No sentTimestamp found")?
            .as_str()
            .context("Could not convert sentTimestamp to string")?
            .to_string();
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .context("No notification type found")?
            .to_string();
        let deleted = raw
            .get("objectDeleted")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let kind = if deleted {
            NotificationKind::Deleted
        } else {
            serde_json::from_value(Value::Object(raw))
                .map_err(|e| anyhow!("Malformed {tag} notification: {e}"))?
        };
        Ok(Self {
            sent_timestamp,
            kind,
        })
    }
}

fn anchor(href: &str, title: &str) -> String {
    format!(r#"<a href="{href}" title="{title}">{title}</a>"#)
}

impl DataverseRef {
    fn link(&self) -> String {
        anchor(
            &format!("/dataverse/{}", self.dataverse_alias),
            &self.dataverse_display_name,
        )
    }
}

impl OwnerRef {
    fn link(&self) -> String {
        anchor(
            &format!("/dataverse/{}", self.owner_alias),
            &self.owner_display_name,
        )
    }
}

impl DatasetRef {
    fn link(&self) -> String {
        anchor(
            &format!(
                "/dataset.xhtml?persistentId={}",
                self.dataset_persistent_identifier
            ),
            &self.dataset_display_name,
        )
    }
}

impl Requestor {
    fn describe(&self) -> String {
        format!(
            "{} {} ({})",
            self.requestor_first_name, self.requestor_last_name, self.requestor_email
        )
    }
}

impl UserGuides {
    fn link(&self, page: &str, title: &str) -> String {
        format!(
            r#"<a href="{}/{}/user/{page}" title="{title}" target="_blank">User Guide</a>"#,
            self.user_guides_base_url.trim_end_matches('/'),
            self.user_guides_version
        )
    }
}

impl NotificationKind {
    /// The message with its links, as shown in the Dataverse UI.
    pub fn html(&self) -> String {
        match self {
            Self::AssignRole(r) => format!(
                "You have been granted the {} role for {}.",
                r.role_name,
                r.dataverse.link()
            ),
            Self::RevokeRole(r) => format!(
                "One of your roles for {} has been revoked.",
                r.dataverse.link()
            ),
            Self::CreateDataverse(c) => format!(
                "{} was created in {} . To learn more about what you can do with your dataverse, check out the {}.",
                c.dataverse.link(),
                c.owner.link(),
                c.guides.link(
                    "dataverse-management.html",
                    "Dataverse Management - Dataverse User Guide"
                )
            ),
            Self::CreateDataset(c) => format!(
                "{} was created in {} . To learn more about what you can do with a dataset, check out the {}.",
                c.dataset.link(),
                c.owner.link(),
                c.guides.link(
                    "dataset-management.html",
                    "Dataset Management - Dataverse User Guide"
                )
            ),
            Self::CreateAccount(a) => format!(
                "Welcome to {}! Get started by adding or finding data. Have questions? Check out the {}.",
                a.installation_brand_name,
                a.guides.link("index.html", "Dataverse User Guide")
            ),
            Self::SubmittedForReview(r) => format!(
                "{} was submitted for review to be published in {}. Don't forget to publish it or send it back to the contributor, {}!",
                r.dataset.link(),
                r.owner.link(),
                r.requestor.describe()
            ),
            Self::ReturnedForRevision(d) => format!(
                "{} was returned by the curator of {}.",
                d.dataset.link(),
                d.owner.link()
            ),
            Self::Published(d) => format!(
                "{} was published in {}.",
                d.dataset.link(),
                d.owner.link()
            ),
            Self::PublishFailedPidReg(d) => format!(
                "{} in {} could not be published due to a failure to register, or update the Global Identifier for the dataset or one of the files in it. Contact support if this continues to happen.",
                d.dataset.link(),
                d.owner.link()
            ),
            Self::RequestFileAccess(r) => format!(
                "File access requested for dataset: {} was made by {}.",
                r.dataset.link(),
                r.requestor.describe()
            ),
            Self::GrantFileAccess(d) => {
                format!("Access granted for files in dataset: {}.", d.link())
            }
            Self::RejectFileAccess(d) => format!(
                "Your request for access was rejected for the requested files in the dataset: {}.",
                d.link()
            ),
            Self::StatusUpdated(s) => format!(
                "The status of dataset {} has been updated to {}.",
                s.dataset.link(),
                s.current_curation_status
            ),
            Self::Deleted => DELETED_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Rendered {
    pub html: String,
    pub plain: String,
}

impl Notification {
    pub fn render(&self) -> Rendered {
        let html = self.kind.html();
        let plain = strip_tags(&html);
        Rendered { html, plain }
    }

    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        let Rendered { html, plain } = self.render();
        let ts = &self.sent_timestamp;
        write!(out, "{html} {ts}\n\n{plain} {ts}\n\n\n")?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct Envelope {
    data: NotificationList,
}

#[derive(Deserialize)]
struct NotificationList {
    notifications: Vec<Notification>,
}

/// Decodes a `/api/notifications/all` response, failing on the first malformed entry.
pub fn decode(response: Value) -> Result<Vec<Notification>> {
    let envelope: Envelope =
        serde_json::from_value(response).context("Could not decode notifications")?;
    Ok(envelope.data.notifications)
}

/// Renders each notification in the order returned.
pub fn print_all(notifications: &[Notification], out: &mut impl Write) -> Result<()> {
    for notification in notifications {
        notification.write_to(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(notification: Value) -> Result<Notification> {
        Ok(serde_json::from_value(notification)?)
    }

    fn submitted() -> Value {
        json!({
            "id": 7,
            "type": "SUBMITTEDDS",
            "sentTimestamp": "2025-06-02T14:01:09Z",
            "datasetPersistentIdentifier": "doi:10.5072/FK2/ABCDEF",
            "datasetDisplayName": "Ocean Temperatures",
            "ownerAlias": "climate",
            "ownerDisplayName": "Climate Lab",
            "requestorFirstName": "Ada",
            "requestorLastName": "Lovelace",
            "requestorEmail": "ada@example.edu"
        })
    }

    #[test]
    fn test_assign_role_has_one_anchor() {
        let n = one(json!({
            "type": "ASSIGNROLE",
            "sentTimestamp": "2015-09-13T22:31:54Z",
            "roleName": "Admin",
            "dataverseAlias": "root",
            "dataverseDisplayName": "Root"
        }))
        .unwrap();
        let rendered = n.render();
        assert_eq!(
            rendered.html,
            r#"You have been granted the Admin role for <a href="/dataverse/root" title="Root">Root</a>."#
        );
        assert_eq!(rendered.html.matches("<a ").count(), 1);
        assert_eq!(rendered.html.matches("</a>").count(), 1);
        assert!(!rendered.plain.contains('<'));
        assert_eq!(rendered.plain, "You have been granted the Admin role for Root.");
    }

    #[test]
    fn test_submitted_for_review_interpolates_all_fields() {
        let rendered = one(submitted()).unwrap().render();
        assert_eq!(
            rendered.plain,
            "Ocean Temperatures was submitted for review to be published in Climate Lab. \
             Don't forget to publish it or send it back to the contributor, Ada Lovelace (ada@example.edu)!"
        );
        assert!(rendered
            .html
            .contains(r#"href="/dataset.xhtml?persistentId=doi:10.5072/FK2/ABCDEF""#));
        assert!(rendered.html.contains(r#"href="/dataverse/climate""#));
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let n = one(json!({"type": "CHECKSUMFAIL", "sentTimestamp": "t"})).unwrap();
        assert!(matches!(n.kind, NotificationKind::Deleted));
        assert_eq!(n.render().plain, DELETED_MESSAGE);
    }

    #[test]
    fn test_deleted_object_falls_back_without_payload() {
        let n = one(json!({
            "type": "ASSIGNROLE",
            "sentTimestamp": "t",
            "objectDeleted": true
        }))
        .unwrap();
        assert_eq!(n.render().html, DELETED_MESSAGE);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let mut payload = submitted();
        payload.as_object_mut().unwrap().remove("requestorEmail");
        let err = one(payload).unwrap_err().to_string();
        assert!(err.contains("SUBMITTEDDS"), "{err}");
        assert!(err.contains("requestorEmail"), "{err}");
    }

    #[test]
    fn test_guides_link() {
        let n = one(json!({
            "type": "CREATEACC",
            "sentTimestamp": "t",
            "installationBrandName": "Demo Dataverse",
            "userGuidesBaseUrl": "https://guides.dataverse.org/",
            "userGuidesVersion": "6.7"
        }))
        .unwrap();
        let rendered = n.render();
        assert!(rendered
            .html
            .contains(r#"href="https://guides.dataverse.org/6.7/user/index.html""#));
        assert_eq!(
            rendered.plain,
            "Welcome to Demo Dataverse! Get started by adding or finding data. Have questions? Check out the User Guide."
        );
    }

    #[test]
    fn test_print_all_format_and_order() {
        let notifications = decode(json!({
            "status": "OK",
            "data": {"notifications": [
                {"type": "GRANTFILEACCESS", "sentTimestamp": "t1",
                 "datasetPersistentIdentifier": "doi:10.5072/FK2/A", "datasetDisplayName": "A"},
                {"type": "PUBLISHEDDS", "sentTimestamp": "t2",
                 "datasetPersistentIdentifier": "doi:10.5072/FK2/B", "datasetDisplayName": "B",
                 "ownerAlias": "root", "ownerDisplayName": "Root"}
            ]}
        }))
        .unwrap();
        let mut out = Vec::new();
        print_all(&notifications, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[2], "Access granted for files in dataset: A. t1");
        assert_eq!(lines[7], "B was published in Root. t2");
        assert!(lines[1].is_empty() && lines[3].is_empty() && lines[4].is_empty());
    }

    #[test]
    fn test_empty_list_prints_nothing() {
        let notifications = decode(json!({"data": {"notifications": []}})).unwrap();
        let mut out = Vec::new();
        print_all(&notifications, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_malformed_entry_fails_whole_decode() {
        let result = decode(json!({"data": {"notifications": [
            {"type": "PUBLISHEDDS", "sentTimestamp": "t"},
        ]}}));
        assert!(result.is_err());
    }
}
