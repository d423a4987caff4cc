use tracing::*;

use crate::{SftpClientError, SftpSession};

/// Walks down `directories` from the current working directory, creating
/// each level that can't be entered. Leaves the session inside the last one.
///
/// Already-existing directories are never re-created, so this is safe to
/// repeat against the same tree.
pub async fn ensure_directories<S: SftpSession + ?Sized>(
    session: &mut S,
    directories: &[String],
) -> Result<(), SftpClientError> {
    for directory in directories {
        if let Err(error) = session.cd(directory).await {
            debug!(%directory, %error, "Directory not reachable, creating it");
            session.mkdir(directory).await?;
            session.cd(directory).await?;
        }
    }
    Ok(())
}
