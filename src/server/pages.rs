//! Server-rendered pages. Deliberately plain HTML; every handler takes
//! `PageSession`, so rendering only happens after the render-time check.

use axum::extract::State;
use axum::response::Html;
use serde::Deserialize;

use super::extract::Query;
use super::guards::PageSession;
use super::AppState;
use crate::identity::Session;

#[derive(Debug, Deserialize)]
pub struct SigninQuery {
    pub next: Option<String>,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Post-login target. Only same-origin absolute paths are honoured.
pub(crate) fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n,
        _ => "/",
    }
}

fn layout(title: &str, session: Option<&Session>, body: &str) -> Html<String> {
    let who = match session {
        Some(s) => format!(
            "<span>{} ({})</span> <button onclick=\"fetch('/api/auth/logout',{{method:'POST'}}).then(()=>location='/signin')\">Sign out</button>",
            escape(&s.subject),
            s.role
        ),
        None => "<a href=\"/signin\">Sign in</a>".to_string(),
    };
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{t} | matchdesk</title></head>\
         <body><header><a href=\"/\">matchdesk</a> {who}</header><main><h1>{t}</h1>{body}</main></body></html>",
        t = escape(title),
    ))
}

fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() { return "<p>Nothing here yet.</p>".to_string(); }
    let head: String = headers.iter().map(|h| format!("<th>{}</th>", escape(h))).collect();
    let body: String = rows
        .iter()
        .map(|r| format!("<tr>{}</tr>", r.iter().map(|c| format!("<td>{}</td>", escape(c))).collect::<String>()))
        .collect();
    format!("<table><thead><tr>{}</tr></thead><tbody>{}</tbody></table>", head, body)
}

pub async fn home(PageSession(session): PageSession) -> Html<String> {
    let links = match session.as_ref().map(|s| s.role.as_str()) {
        Some("admin") => "<a href=\"/admin\">Admin dashboard</a>",
        Some("ktv") => "<a href=\"/ktv\">Technician dashboard</a> | <a href=\"/admin\">Admin area</a>",
        _ => "<p>Football match analysis desk.</p>",
    };
    layout("Home", session.as_ref(), links)
}

pub async fn signin(PageSession(session): PageSession, Query(q): Query<SigninQuery>) -> Html<String> {
    let next = escape(safe_next(q.next.as_deref()));
    let form = format!(
        "<form id=\"f\"><input name=\"username\" autocomplete=\"username\"> \
         <input name=\"password\" type=\"password\" autocomplete=\"current-password\"> <button>Sign in</button></form>\
         <p id=\"e\"></p><script>document.getElementById('f').onsubmit=async(ev)=>{{ev.preventDefault();\
         const d=Object.fromEntries(new FormData(ev.target));\
         const r=await fetch('/api/auth/login',{{method:'POST',headers:{{'content-type':'application/json'}},body:JSON.stringify(d)}});\
         if(r.ok){{location='{next}';}}else{{document.getElementById('e').textContent=(await r.json()).error;}}}};</script>"
    );
    layout("Sign in", session.as_ref(), &form)
}

pub async fn unauthorized(PageSession(session): PageSession) -> Html<String> {
    layout("Not allowed", session.as_ref(), "<p>Your account does not have access to that page.</p>")
}

pub async fn admin_dashboard(State(state): State<AppState>, PageSession(session): PageSession) -> Html<String> {
    let body = format!(
        "<ul><li><a href=\"/admin/leagues\">Leagues</a> ({})</li><li><a href=\"/admin/matches\">Matches</a> ({})</li>\
         <li><a href=\"/admin/users\">Users</a></li></ul>",
        state.store.list_leagues().len(),
        state.store.list_matches(None).len(),
    );
    layout("Admin", session.as_ref(), &body)
}

pub async fn admin_leagues(State(state): State<AppState>, PageSession(session): PageSession) -> Html<String> {
    let rows = state
        .store
        .list_leagues()
        .into_iter()
        .map(|l| vec![l.name, l.country.unwrap_or_default(), l.season.unwrap_or_default()])
        .collect();
    layout("Leagues", session.as_ref(), &table(&["Name", "Country", "Season"], rows))
}

fn match_rows(state: &AppState) -> Vec<Vec<String>> {
    state
        .store
        .list_matches(None)
        .into_iter()
        .map(|m| {
            vec![
                m.home_team,
                m.away_team,
                m.kickoff_at.map(|k| k.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_default(),
                format!("{:?}", m.status).to_lowercase(),
            ]
        })
        .collect()
}

pub async fn admin_matches(State(state): State<AppState>, PageSession(session): PageSession) -> Html<String> {
    layout("Matches", session.as_ref(), &table(&["Home", "Away", "Kickoff", "Status"], match_rows(&state)))
}

pub async fn admin_users(State(state): State<AppState>, PageSession(session): PageSession) -> Html<String> {
    let rows = state
        .store
        .list_users()
        .into_iter()
        .map(|u| vec![u.username, u.role.to_string(), format!("{:?}", u.status).to_lowercase()])
        .collect();
    layout("Users", session.as_ref(), &table(&["Username", "Role", "Status"], rows))
}

pub async fn ktv_dashboard(State(state): State<AppState>, PageSession(session): PageSession) -> Html<String> {
    let body = format!(
        "<ul><li><a href=\"/ktv/matches\">Matches</a> ({})</li><li>Articles: {}</li></ul>",
        state.store.list_matches(None).len(),
        state.store.list_articles(None).len(),
    );
    layout("Technician", session.as_ref(), &body)
}

pub async fn ktv_matches(State(state): State<AppState>, PageSession(session): PageSession) -> Html<String> {
    layout("Matches", session.as_ref(), &table(&["Home", "Away", "Kickoff", "Status"], match_rows(&state)))
}
