/// Shared page layout
use crate::{
    account::ActiveSession,
    csrf::CSRF_FIELD,
    db::models::User,
    error::Notice,
};
use serde::Deserialize;

/// Per-request values every page needs
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub association_name: &'a str,
    pub user: Option<&'a User>,
    pub csrf_token: Option<&'a str>,
    pub notice: Option<Notice>,
}

impl<'a> PageContext<'a> {
    pub fn new(association_name: &'a str, session: Option<&'a ActiveSession>, notice: Option<Notice>) -> Self {
        Self {
            association_name,
            user: session.and_then(|s| s.user.as_ref()),
            csrf_token: session.map(|s| s.csrf_token.as_str()),
            notice,
        }
    }

    /// Hidden CSRF input for forms on this page
    pub fn csrf_field(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            CSRF_FIELD,
            escape(self.csrf_token.unwrap_or_default())
        )
    }
}

/// `?notice=` query parameter set by redirects
#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

impl NoticeQuery {
    /// Unknown codes are ignored
    pub fn notice(&self) -> Option<Notice> {
        self.notice.as_deref().and_then(Notice::from_slug)
    }
}

/// Escape text for HTML element and attribute content
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Full page with navigation and the notice banner
pub fn page(ctx: &PageContext<'_>, title: &str, body: &str) -> String {
    let nav = navigation(ctx);
    let banner = ctx.notice.map(notice_banner).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} - {association}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body>
<nav class="navbar navbar-expand navbar-dark bg-dark mb-4">
<div class="container">
<a class="navbar-brand" href="/">{association}</a>
{nav}
</div>
</nav>
<main class="container">
{banner}
<h1 class="h3 mb-4">{title}</h1>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        association = escape(ctx.association_name),
        nav = nav,
        banner = banner,
        body = body,
    )
}

fn navigation(ctx: &PageContext<'_>) -> String {
    let Some(user) = ctx.user else {
        return r#"<div class="navbar-nav ms-auto"><a class="nav-link" href="/login">Log in</a></div>"#.to_string();
    };

    let mut links = String::from(r#"<a class="nav-link" href="/events">Events</a>"#);
    if user.member_id.is_some() {
        links.push_str(r#"<a class="nav-link" href="/card">My card</a>"#);
    }
    if user.is_admin() {
        links.push_str(r#"<a class="nav-link" href="/admin/members">Members</a>"#);
        links.push_str(r#"<a class="nav-link" href="/admin/events">Manage events</a>"#);
        links.push_str(r#"<a class="nav-link" href="/admin/social_years">Fees</a>"#);
        links.push_str(r#"<a class="nav-link" href="/admin/ledger">Ledger</a>"#);
    }

    format!(
        r#"<div class="navbar-nav me-auto">{links}</div>
<form class="d-flex" method="post" action="/logout">{csrf}
<span class="navbar-text me-3">{email}</span>
<button class="btn btn-outline-light btn-sm" type="submit">Log out</button>
</form>"#,
        links = links,
        csrf = ctx.csrf_field(),
        email = escape(&user.email),
    )
}

fn notice_banner(notice: Notice) -> String {
    format!(
        r#"<div class="alert {}" role="alert">{}</div>"#,
        notice.level().css_class(),
        escape(notice.text())
    )
}

/// Minimal page for error responses, rendered without a session
pub fn error_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body>
<main class="container py-5">
<h1 class="h3">{title}</h1>
<p>{message}</p>
<a href="/">Back to the home page</a>
</main>
</body>
</html>"#,
        title = escape(title),
        message = escape(message),
    )
}

/// Format an optional value for a table cell
pub fn or_dash(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">O'Neil & co</a>"#), "&lt;a href=&quot;x&quot;&gt;O&#x27;Neil &amp; co&lt;/a&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_page_shows_notice_and_escapes_title() {
        let ctx = PageContext {
            association_name: "Circolo <Arci>",
            user: None,
            csrf_token: None,
            notice: Some(Notice::LoggedOut),
        };
        let html = page(&ctx, "Home", "<p>body</p>");

        assert!(html.contains("Circolo &lt;Arci&gt;"));
        assert!(html.contains("alert-success"));
        assert!(html.contains(Notice::LoggedOut.text()));
        assert!(html.contains("<p>body</p>"));
        assert!(html.contains(r#"href="/login""#));
    }

    #[test]
    fn test_notice_query_ignores_unknown_codes() {
        let query = NoticeQuery {
            notice: Some("<script>".to_string()),
        };
        assert_eq!(query.notice(), None);

        let query = NoticeQuery {
            notice: Some("registered".to_string()),
        };
        assert_eq!(query.notice(), Some(Notice::Registered));
    }
}
