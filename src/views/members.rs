/// Card verification and the member's own card
use super::layout::{escape, or_dash, page, PageContext};
use crate::{
    db::models::Member,
    verification::{CardStatus, CardVerification},
};

fn status_banner(status: CardStatus) -> &'static str {
    match status {
        CardStatus::Active => r#"<div class="alert alert-success"><strong>Valid membership</strong></div>"#,
        CardStatus::Expired => {
            r#"<div class="alert alert-warning"><strong>Membership expired</strong>: the fee for the current social year has not been paid.</div>"#
        }
        CardStatus::Invalid => r#"<div class="alert alert-danger"><strong>Invalid card</strong></div>"#,
    }
}

fn member_details(member: &Member) -> String {
    let photo = member
        .photo_url
        .as_deref()
        .map(|url| format!(r#"<img src="{}" alt="" class="img-thumbnail mb-3" width="160">"#, escape(url)))
        .unwrap_or_default();

    format!(
        r#"{photo}
<dl class="row">
<dt class="col-sm-4">Name</dt><dd class="col-sm-8">{name}</dd>
<dt class="col-sm-4">Membership number</dt><dd class="col-sm-8">{number}</dd>
</dl>"#,
        photo = photo,
        name = escape(&member.name),
        number = escape(&member.membership_number),
    )
}

/// Public verification page. Invalid cards render without any member data.
pub fn verify_page(ctx: &PageContext<'_>, verification: &CardVerification) -> String {
    let details = verification.member.as_ref().map(member_details).unwrap_or_default();
    let body = format!("{}{}", status_banner(verification.status), details);

    page(ctx, "Membership card", &body)
}

pub fn card_page(ctx: &PageContext<'_>, member: &Member, status: CardStatus, verify_url: &str) -> String {
    let body = format!(
        r#"{banner}
{details}
<dl class="row">
<dt class="col-sm-4">Fiscal code</dt><dd class="col-sm-8">{fiscal_code}</dd>
</dl>
<div class="card col-md-6">
<div class="card-body">
<p class="card-text">Show this link (or its QR code) to have your membership checked:</p>
<p class="card-text"><a href="{url}" data-qr="{url}">{url}</a></p>
</div>
</div>"#,
        banner = status_banner(status),
        details = member_details(member),
        fiscal_code = or_dash(member.fiscal_code.as_deref()),
        url = escape(verify_url),
    );

    page(ctx, "My membership card", &body)
}
