/// Admin pages
use super::{
    events::EventListing,
    layout::{escape, or_dash, page, PageContext},
};
use crate::{
    db::models::{format_cents, Event, LedgerEntry, LedgerKind, Member, MemberStatus, SocialYear},
    events::RegistrationRow,
    exports::ExportField,
    fees::PaymentRow,
    members::MemberFilter,
};

fn post_button(ctx: &PageContext<'_>, action: &str, class: &str, label: &str) -> String {
    format!(
        r#"<form method="post" action="{action}" class="d-inline">{csrf}<button class="btn btn-sm {class}" type="submit">{label}</button></form>"#,
        action = action,
        csrf = ctx.csrf_field(),
        class = class,
        label = label,
    )
}

fn selected(condition: bool) -> &'static str {
    if condition {
        " selected"
    } else {
        ""
    }
}

pub fn members_page(ctx: &PageContext<'_>, members: &[Member], filter: &MemberFilter) -> String {
    let rows: String = members
        .iter()
        .map(|m| {
            let toggle = if m.is_active() {
                post_button(ctx, &format!("/admin/members/{}/deactivate", m.id), "btn-outline-warning", "Deactivate")
            } else {
                post_button(ctx, &format!("/admin/members/{}/activate", m.id), "btn-outline-success", "Activate")
            };
            let rotate = post_button(ctx, &format!("/admin/members/{}/rotate_card", m.id), "btn-outline-secondary", "New card");
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{} {}</td></tr>",
                escape(&m.membership_number),
                escape(&m.name),
                escape(&m.email),
                m.status,
                or_dash(m.fiscal_code.as_deref()),
                toggle,
                rotate
            )
        })
        .collect();

    let status = filter.status();
    let field_keys: Vec<&str> = ExportField::ALL.iter().map(|f| f.key()).collect();

    let body = format!(
        r#"<form method="get" action="/admin/members" class="row g-2 mb-3">
<div class="col-auto"><input class="form-control" name="search" placeholder="Search" value="{search}"></div>
<div class="col-auto"><select class="form-select" name="status">
<option value="">All</option>
<option value="active"{active}>Active</option>
<option value="inactive"{inactive}>Inactive</option>
</select></div>
<div class="col-auto"><button class="btn btn-secondary" type="submit">Filter</button></div>
</form>
<table class="table table-sm">
<thead><tr><th>Number</th><th>Name</th><th>Email</th><th>Status</th><th>Fiscal code</th><th></th></tr></thead>
<tbody>{rows}</tbody>
</table>

<h2 class="h5 mt-4">Export active members</h2>
<form method="get" action="/export_active_members" class="mb-4">
<input class="form-control mb-2" name="fields" placeholder="Fields, comma separated (empty for all)">
<p class="form-text">Available fields: {field_keys}</p>
<label class="me-3"><input type="checkbox" class="form-check-input" name="paid_only" value="true"> Only members who paid the current year</label>
<button class="btn btn-outline-primary btn-sm" type="submit">Download CSV</button>
</form>

<h2 class="h5 mt-4">New member</h2>
<form method="post" action="/admin/members" class="col-md-6">
{csrf}
<input class="form-control mb-2" name="name" placeholder="Full name" required>
<input class="form-control mb-2" type="email" name="email" placeholder="Email" required>
<input class="form-control mb-2" name="membership_number" placeholder="Membership number" required>
<input class="form-control mb-2" name="fiscal_code" placeholder="Fiscal code">
<input class="form-control mb-2" type="url" name="photo_url" placeholder="Photo URL">
<input class="form-control mb-2" type="password" name="login_password" placeholder="Login password (optional)" minlength="8">
<button class="btn btn-primary" type="submit">Save member</button>
</form>"#,
        search = escape(filter.search.as_deref().unwrap_or_default()),
        active = selected(status == Some(MemberStatus::Active)),
        inactive = selected(status == Some(MemberStatus::Inactive)),
        rows = rows,
        field_keys = field_keys.join(", "),
        csrf = ctx.csrf_field(),
    );

    page(ctx, "Members", &body)
}

pub fn events_page(ctx: &PageContext<'_>, events: &[EventListing]) -> String {
    let rows: String = events
        .iter()
        .map(|l| {
            let e = &l.event;
            let toggle = if e.is_published() {
                post_button(ctx, &format!("/admin/events/{}/unpublish", e.id), "btn-outline-warning", "Unpublish")
            } else {
                post_button(ctx, &format!("/admin/events/{}/publish", e.id), "btn-outline-success", "Publish")
            };
            let capacity = e.capacity.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
            let available = l.available.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
            format!(
                r#"<tr><td><a href="/admin/events/{id}">{title}</a></td><td>{date}</td><td>{status:?}</td><td>{capacity}</td><td>{available}</td><td>{toggle}</td></tr>"#,
                id = e.id,
                title = escape(&e.title),
                date = e.event_date.format("%Y-%m-%d"),
                status = e.status,
                capacity = capacity,
                available = available,
                toggle = toggle,
            )
        })
        .collect();

    let body = format!(
        r#"<table class="table table-sm">
<thead><tr><th>Title</th><th>Date</th><th>Status</th><th>Capacity</th><th>Available</th><th></th></tr></thead>
<tbody>{rows}</tbody>
</table>

<h2 class="h5 mt-4">New event</h2>
<form method="post" action="/admin/events" class="col-md-6">
{csrf}
<input class="form-control mb-2" name="title" placeholder="Title" required>
<textarea class="form-control mb-2" name="description" placeholder="Description"></textarea>
<div class="row g-2 mb-2">
<div class="col"><input class="form-control" type="date" name="event_date" required></div>
<div class="col"><input class="form-control" type="time" name="event_time"></div>
</div>
<select class="form-select mb-2" name="mode">
<option value="in_person">In person</option>
<option value="online">Online</option>
<option value="hybrid">Hybrid</option>
</select>
<input class="form-control mb-2" name="location" placeholder="Location">
<div class="row g-2 mb-2">
<div class="col"><input class="form-control" name="cost" placeholder="Cost (e.g. 10.00)"></div>
<div class="col"><input class="form-control" type="number" min="0" name="capacity" placeholder="Capacity (empty = unlimited)"></div>
</div>
<label class="mb-2"><input type="checkbox" class="form-check-input" name="publish"> Publish now</label><br>
<button class="btn btn-primary" type="submit">Save event</button>
</form>"#,
        rows = rows,
        csrf = ctx.csrf_field(),
    );

    page(ctx, "Manage events", &body)
}

pub fn event_page(ctx: &PageContext<'_>, event: &Event, registrations: &[RegistrationRow]) -> String {
    let capacity = event.capacity;
    let rows: String = registrations
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let rank = i as i64 + 1;
            let place = match capacity {
                Some(c) if rank > c => format!("Waiting list #{}", rank - c),
                _ => "Confirmed".to_string(),
            };
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                rank,
                escape(&r.membership_number),
                escape(&r.member_name),
                r.created_at.format("%Y-%m-%d %H:%M"),
                place
            )
        })
        .collect();

    let body = format!(
        r#"<p>{count} registrations, capacity {capacity}.</p>
<table class="table table-sm">
<thead><tr><th>#</th><th>Number</th><th>Name</th><th>Registered at</th><th>Place</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<a href="/admin/events">Back to events</a>"#,
        count = registrations.len(),
        capacity = capacity.map(|c| c.to_string()).unwrap_or_else(|| "unlimited".to_string()),
        rows = rows,
    );

    page(ctx, &event.title, &body)
}

pub fn social_years_page(
    ctx: &PageContext<'_>,
    years: &[SocialYear],
    shown_year: Option<&SocialYear>,
    payments: &[PaymentRow],
    members: &[Member],
) -> String {
    let year_rows: String = years
        .iter()
        .map(|y| {
            let action = if y.is_current {
                r#"<span class="badge bg-success">Current</span>"#.to_string()
            } else {
                post_button(ctx, &format!("/admin/social_years/{}/activate", y.id), "btn-outline-primary", "Make current")
            };
            format!(
                r#"<tr><td><a href="/admin/social_years?year={id}">{name}</a></td><td>{start}</td><td>{end}</td><td>{action}</td></tr>"#,
                id = y.id,
                name = escape(&y.name),
                start = y.start_date,
                end = y.end_date,
                action = action,
            )
        })
        .collect();

    let payments_section = match shown_year {
        Some(year) => {
            let rows: String = payments
                .iter()
                .map(|p| {
                    format!(
                        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                        escape(&p.membership_number),
                        escape(&p.member_name),
                        p.paid_date,
                        format_cents(p.amount_cents),
                        post_button(ctx, &format!("/admin/payments/{}/delete", p.id), "btn-outline-danger", "Remove")
                    )
                })
                .collect();
            let member_options: String = members
                .iter()
                .map(|m| {
                    format!(
                        r#"<option value="{}">{} - {}</option>"#,
                        m.id,
                        escape(&m.membership_number),
                        escape(&m.name)
                    )
                })
                .collect();
            format!(
                r#"<h2 class="h5 mt-4">Payments {name}</h2>
<table class="table table-sm">
<thead><tr><th>Number</th><th>Member</th><th>Paid on</th><th>Amount</th><th></th></tr></thead>
<tbody>{rows}</tbody>
</table>
<form method="post" action="/admin/payments" class="row g-2 col-md-8">
{csrf}
<input type="hidden" name="social_year_id" value="{id}">
<div class="col-12"><select class="form-select" name="member_id">{member_options}</select></div>
<div class="col"><input class="form-control" type="date" name="paid_date" required></div>
<div class="col"><input class="form-control" name="amount" placeholder="Amount" required></div>
<div class="col-auto"><button class="btn btn-primary" type="submit">Record payment</button></div>
</form>"#,
                name = escape(&year.name),
                rows = rows,
                csrf = ctx.csrf_field(),
                id = year.id,
                member_options = member_options,
            )
        }
        None => r#"<p class="text-muted mt-4">Create a social year to record payments.</p>"#.to_string(),
    };

    let body = format!(
        r#"<table class="table table-sm">
<thead><tr><th>Name</th><th>Start</th><th>End</th><th></th></tr></thead>
<tbody>{year_rows}</tbody>
</table>
<form method="post" action="/admin/social_years" class="row g-2 col-md-10">
{csrf}
<div class="col"><input class="form-control" name="name" placeholder="Name (e.g. 2025)" required></div>
<div class="col"><input class="form-control" type="date" name="start_date" required></div>
<div class="col"><input class="form-control" type="date" name="end_date" required></div>
<div class="col-auto"><label><input type="checkbox" class="form-check-input" name="make_current"> Current</label></div>
<div class="col-auto"><button class="btn btn-primary" type="submit">Add social year</button></div>
</form>
{payments_section}"#,
        year_rows = year_rows,
        csrf = ctx.csrf_field(),
        payments_section = payments_section,
    );

    page(ctx, "Social years and fees", &body)
}

pub fn ledger_page(ctx: &PageContext<'_>, year: i32, entries: &[LedgerEntry]) -> String {
    let rows: String = entries
        .iter()
        .map(|e| {
            let (class, kind) = match e.kind {
                LedgerKind::Income => ("table-success", "Income"),
                LedgerKind::Expense => ("table-danger", "Expense"),
            };
            format!(
                r#"<tr class="{}"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
                class,
                e.entry_date,
                kind,
                escape(&e.description),
                or_dash(e.category.as_deref()),
                format_cents(e.amount_cents)
            )
        })
        .collect();

    let body = format!(
        r#"<form method="get" action="/admin/ledger" class="row g-2 mb-3">
<div class="col-auto"><input class="form-control" type="number" name="year" value="{year}"></div>
<div class="col-auto"><button class="btn btn-secondary" type="submit">Show</button></div>
<div class="col-auto"><a class="btn btn-outline-primary" href="/export_excel?year={year}">Download report</a></div>
</form>
<table class="table table-sm">
<thead><tr><th>Date</th><th>Type</th><th>Description</th><th>Category</th><th>Amount</th></tr></thead>
<tbody>{rows}</tbody>
</table>
<h2 class="h5 mt-4">New entry</h2>
<form method="post" action="/admin/ledger" class="col-md-6">
{csrf}
<select class="form-select mb-2" name="kind">
<option value="income">Income</option>
<option value="expense">Expense</option>
</select>
<input class="form-control mb-2" type="date" name="entry_date" required>
<input class="form-control mb-2" name="description" placeholder="Description" required>
<input class="form-control mb-2" name="category" placeholder="Category">
<input class="form-control mb-2" name="amount" placeholder="Amount" required>
<button class="btn btn-primary" type="submit">Save entry</button>
</form>"#,
        year = year,
        rows = rows,
        csrf = ctx.csrf_field(),
    );

    page(ctx, &format!("Ledger {}", year), &body)
}
