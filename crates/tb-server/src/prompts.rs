use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tb_core::domain::{ChatError, GradeLevelProfile, PromptStore};

/// Reads grade-level instruction documents from a directory on disk.
pub struct FsPromptStore {
    dir: PathBuf,
}

impl FsPromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PromptStore for FsPromptStore {
    fn load<'a>(
        &'a self,
        grade_level: &'a GradeLevelProfile,
    ) -> Pin<Box<dyn Future<Output = Result<String, ChatError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.dir.join(&grade_level.prompt_resource_key);
            tokio::fs::read_to_string(&path).await.map_err(|err| {
                tracing::error!(
                    error = %err,
                    path = %path.display(),
                    grade_level = %grade_level.id,
                    "failed to read system prompt"
                );
                ChatError::ResourceNotFound {
                    grade_level: grade_level.id.clone(),
                    key: grade_level.prompt_resource_key.clone(),
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_core::domain::GradeLevelId;

    fn grade(prompt_file: &str) -> GradeLevelProfile {
        GradeLevelProfile {
            id: GradeLevelId::new("middle"),
            display_name: "Middle School".to_owned(),
            range: "6th - 8th Grade".to_owned(),
            prompt_resource_key: prompt_file.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_load_existing_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("middle_6-8.md"), "You tutor middle schoolers.").unwrap();
        let store = FsPromptStore::new(dir.path());

        let prompt = store.load(&grade("middle_6-8.md")).await.unwrap();

        assert_eq!(prompt, "You tutor middle schoolers.");
    }

    #[tokio::test]
    async fn test_missing_prompt_is_resource_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsPromptStore::new(dir.path());

        match store.load(&grade("missing.md")).await {
            Err(ChatError::ResourceNotFound { grade_level, key }) => {
                assert_eq!(grade_level, GradeLevelId::new("middle"));
                assert_eq!(key, "missing.md");
            }
            other => panic!("expected ResourceNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shipped_prompts_exist() {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../prompts");
        let store = FsPromptStore::new(dir);

        for file in ["elementary_1-5.md", "middle_6-8.md", "high_9-12.md"] {
            let prompt = store.load(&grade(file)).await.unwrap();
            assert!(!prompt.trim().is_empty(), "{file} should not be empty");
        }
    }
}
