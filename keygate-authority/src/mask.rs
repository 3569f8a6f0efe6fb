//! Token masking for log output.

/// Masks an activation token (or license key) for logging, keeping a short
/// prefix so related log lines can still be correlated.
#[must_use]
pub fn mask_token(token: Option<&str>) -> String {
    const KEEP: usize = 6;
    match token {
        None => "<none>".to_string(),
        Some(t) if t.is_empty() => "<none>".to_string(),
        Some(t) => {
            let chars = t.chars().count();
            if chars <= KEEP {
                "*".repeat(chars)
            } else {
                let prefix: String = t.chars().take(KEEP).collect();
                format!("{prefix}…{}", "*".repeat(chars - KEEP))
            }
        }
    }
}
