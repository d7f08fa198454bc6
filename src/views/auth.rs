/// Login and password recovery pages
use super::layout::{escape, page, PageContext};

pub fn login_page(ctx: &PageContext<'_>) -> String {
    let body = format!(
        r#"<form method="post" action="/login" class="col-md-5">
{csrf}
<div class="mb-3">
<label class="form-label" for="email">Email</label>
<input class="form-control" type="email" id="email" name="email" required autofocus>
</div>
<div class="mb-3">
<label class="form-label" for="password">Password</label>
<input class="form-control" type="password" id="password" name="password" required>
</div>
<button class="btn btn-primary" type="submit">Log in</button>
<a class="ms-3" href="/forgot_password">Forgot your password?</a>
</form>"#,
        csrf = ctx.csrf_field(),
    );

    page(ctx, "Log in", &body)
}

/// Request form. `reset_link` is only set by the development fallback when
/// the link could not be mailed.
pub fn forgot_password_page(ctx: &PageContext<'_>, reset_link: Option<&str>) -> String {
    let fallback = reset_link
        .map(|link| {
            format!(
                r#"<div class="alert alert-secondary">Email delivery is not available. Reset link:
<a href="{0}">{0}</a></div>"#,
                escape(link)
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"{fallback}
<p>Enter the email address of your account and we will send you a link to choose a new password.</p>
<form method="post" action="/forgot_password" class="col-md-5">
{csrf}
<div class="mb-3">
<label class="form-label" for="email">Email</label>
<input class="form-control" type="email" id="email" name="email" required>
</div>
<button class="btn btn-primary" type="submit">Send reset link</button>
</form>"#,
        fallback = fallback,
        csrf = ctx.csrf_field(),
    );

    page(ctx, "Forgot password", &body)
}

pub fn reset_password_page(ctx: &PageContext<'_>, token: &str) -> String {
    let body = format!(
        r#"<form method="post" action="/reset_password" class="col-md-5">
{csrf}
<input type="hidden" name="token" value="{token}">
<div class="mb-3">
<label class="form-label" for="password">New password</label>
<input class="form-control" type="password" id="password" name="password" minlength="8" required>
</div>
<div class="mb-3">
<label class="form-label" for="password_confirm">Repeat password</label>
<input class="form-control" type="password" id="password_confirm" name="password_confirm" minlength="8" required>
</div>
<button class="btn btn-primary" type="submit">Change password</button>
</form>"#,
        csrf = ctx.csrf_field(),
        token = escape(token),
    );

    page(ctx, "Choose a new password", &body)
}
