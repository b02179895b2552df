use crate::models::ids::deserialize_id;
use serde::Deserialize;

/// 平台写入的提交元数据（只取用到的字段）
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionMetadata {
    #[serde(default)]
    pub users: Vec<SubmissionUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionUser {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
}

impl SubmissionMetadata {
    /// 提交者在平台上的 ID；小组作业只取第一位成员
    pub fn owner_id(&self) -> Option<&str> {
        self.users.first().map(|user| user.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_from_first_user() {
        let metadata: SubmissionMetadata = serde_json::from_str(
            r#"{"id": 99, "users": [{"id": 123456, "email": "a@b.c"}, {"id": "7"}]}"#,
        )
        .unwrap();
        assert_eq!(metadata.owner_id(), Some("123456"));
    }

    #[test]
    fn test_owner_id_missing_users() {
        let metadata: SubmissionMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(metadata.owner_id(), None);
    }
}
