use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Scratch area for one request: uploads and chunks live in
/// `<temp root>/<id>`, which is removed by [`Session::dispose`].
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    dir: PathBuf,
}

impl Session {
    pub async fn create(temp_root: &Path) -> std::io::Result<Self> {
        let id = Uuid::now_v7();
        let dir = temp_root.join(id.to_string());

        tokio::fs::create_dir_all(&dir).await?;

        Ok(Self { id, dir })
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output_file_name(&self, extension: &str) -> String {
        format!("output_{}.{extension}", self.id)
    }

    /// Removes the session directory and everything left in it.
    pub async fn dispose(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::info!("Cleaned up directory: {}", self.dir.display());
            }
            Err(e) => {
                tracing::warn!("Could not cleanup {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Name an uploaded video is stored under. Only the extension of the
/// client's file name is kept, and only if it is plain alphanumeric.
pub fn upload_file_name(index: usize, client_name: Option<&str>) -> String {
    let extension = client_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|extension| extension.to_str())
        .filter(|extension| {
            !extension.is_empty()
                && extension.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match extension {
        Some(extension) => format!("video_{index}.{extension}"),
        None => format!("video_{index}"),
    }
}

/// Whether `name` can be looked up in the output directory without
/// escaping it.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}
