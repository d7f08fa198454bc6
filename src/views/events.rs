/// Public event pages
use super::layout::{escape, page, PageContext};
use crate::db::models::{format_cents, Event};

/// Event with its remaining spots (`None` = unlimited)
pub struct EventListing {
    pub event: Event,
    pub available: Option<i64>,
}

/// Event page state for the current user
pub struct EventDetail {
    pub event: Event,
    pub available: Option<i64>,
    pub registered: bool,
    pub waitlist_position: Option<i64>,
    /// Whether the user is linked to a member record
    pub is_member: bool,
}

fn when(event: &Event) -> String {
    match event.event_time {
        Some(time) => format!("{} {}", event.event_date.format("%Y-%m-%d"), time.format("%H:%M")),
        None => event.event_date.format("%Y-%m-%d").to_string(),
    }
}

fn spots(available: Option<i64>) -> String {
    match available {
        None => "Unlimited".to_string(),
        Some(0) => r#"<span class="badge bg-warning text-dark">Full - waiting list</span>"#.to_string(),
        Some(n) => n.to_string(),
    }
}

fn cost(cents: i64) -> String {
    if cents == 0 {
        "Free".to_string()
    } else {
        format_cents(cents)
    }
}

fn listing_table(events: &[EventListing]) -> String {
    if events.is_empty() {
        return r#"<p class="text-muted">No upcoming events.</p>"#.to_string();
    }

    let rows: String = events
        .iter()
        .map(|l| {
            format!(
                r#"<tr><td><a href="/events/{id}">{title}</a></td><td>{when}</td><td>{mode}</td><td>{cost}</td><td>{spots}</td></tr>"#,
                id = l.event.id,
                title = escape(&l.event.title),
                when = when(&l.event),
                mode = l.event.mode.label(),
                cost = cost(l.event.cost_cents),
                spots = spots(l.available),
            )
        })
        .collect();

    format!(
        r#"<table class="table table-striped">
<thead><tr><th>Event</th><th>When</th><th>Mode</th><th>Cost</th><th>Available spots</th></tr></thead>
<tbody>{}</tbody>
</table>"#,
        rows
    )
}

pub fn home_page(ctx: &PageContext<'_>, events: &[EventListing]) -> String {
    let intro = if ctx.user.is_some() {
        String::new()
    } else {
        r#"<p><a class="btn btn-primary" href="/login">Log in</a> to register for events and show your membership card.</p>"#
            .to_string()
    };

    page(ctx, "Welcome", &format!("{}<h2 class=\"h5\">Upcoming events</h2>{}", intro, listing_table(events)))
}

pub fn events_page(ctx: &PageContext<'_>, events: &[EventListing]) -> String {
    page(ctx, "Events", &listing_table(events))
}

pub fn event_page(ctx: &PageContext<'_>, detail: &EventDetail) -> String {
    let event = &detail.event;

    let action = if !detail.is_member {
        r#"<p class="text-muted">Only association members can register.</p>"#.to_string()
    } else if detail.registered {
        let status = match detail.waitlist_position {
            Some(position) => format!("You are number {} on the waiting list.", position),
            None => "You are registered.".to_string(),
        };
        registration_form(ctx, event.id, "unregister", "btn-outline-danger", "Cancel registration", &status)
    } else {
        let label = if detail.available == Some(0) {
            "Join the waiting list"
        } else {
            "Register"
        };
        registration_form(ctx, event.id, "register", "btn-primary", label, "")
    };

    let body = format!(
        r#"<dl class="row">
<dt class="col-sm-3">When</dt><dd class="col-sm-9">{when}</dd>
<dt class="col-sm-3">Mode</dt><dd class="col-sm-9">{mode}</dd>
<dt class="col-sm-3">Location</dt><dd class="col-sm-9">{location}</dd>
<dt class="col-sm-3">Cost</dt><dd class="col-sm-9">{cost}</dd>
<dt class="col-sm-3">Available spots</dt><dd class="col-sm-9">{spots}</dd>
</dl>
<p>{description}</p>
{action}
<p class="mt-4"><a href="/events">All events</a></p>"#,
        when = when(event),
        mode = event.mode.label(),
        location = event.location.as_deref().map(escape).unwrap_or_else(|| "-".to_string()),
        cost = cost(event.cost_cents),
        spots = spots(detail.available),
        description = escape(&event.description),
        action = action,
    );

    page(ctx, &event.title, &body)
}

fn registration_form(ctx: &PageContext<'_>, event_id: i64, action: &str, class: &str, label: &str, status: &str) -> String {
    format!(
        r#"<p>{status}</p>
<form method="post" action="/event_register">
{csrf}
<input type="hidden" name="id" value="{id}">
<input type="hidden" name="action" value="{action}">
<button class="btn {class}" type="submit">{label}</button>
</form>"#,
        status = escape(status),
        csrf = ctx.csrf_field(),
        id = event_id,
        action = action,
        class = class,
        label = label,
    )
}
