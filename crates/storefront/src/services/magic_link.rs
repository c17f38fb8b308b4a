//! Magic-link URL construction.

/// Which flow a magic link completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicLinkKind {
    /// Passwordless login; may carry a post-login redirect.
    PasswordlessLogin,
    /// Password reset; carries the shopper's email.
    ResetPassword,
}

/// Build the magic link emailed to a shopper.
///
/// `{base}{landing}?token=<token>`, plus `&email=<email>` for reset links and
/// `&redirect_url=<redirect>` for passwordless links when a redirect is
/// given. All values are percent-encoded.
#[must_use]
pub fn build(
    base_url: &str,
    landing_path: &str,
    token: &str,
    kind: MagicLinkKind,
    email: &str,
    redirect_url: Option<&str>,
) -> String {
    let mut link = format!(
        "{}{}?token={}",
        base_url.trim_end_matches('/'),
        landing_path,
        urlencoding::encode(token)
    );

    match kind {
        MagicLinkKind::ResetPassword => {
            link.push_str("&email=");
            link.push_str(&urlencoding::encode(email));
        }
        MagicLinkKind::PasswordlessLogin => {
            if let Some(redirect) = redirect_url.filter(|r| !r.is_empty()) {
                link.push_str("&redirect_url=");
                link.push_str(&urlencoding::encode(redirect));
            }
        }
    }

    link
}
