//! In-process fake browser for integration tests
//!
//! Renders a small imitation of the monitoring frontend (login form with
//! lockout, dashboard, host group list and form, host tag form, user
//! profile) as an element tree, and implements [`Driver`] over it. State is
//! kept in a SQLite file that tests open read-only through
//! [`frontcheck_common::Database`], exactly as they would the real one.

#![allow(dead_code)]

use async_trait::async_trait;
use frontcheck_common::Database;
use frontcheck_e2e::{Driver, E2eError, E2eResult, ElementId, Locator};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::time::Instant;

pub const BASE_URL: &str = "http://frontend.test/zabbix/";

pub const LOGIN_ATTEMPTS: i64 = 5;
pub const LOGIN_BLOCK_SECS: i64 = 30;

const SCHEMA: &str = r#"
CREATE TABLE users (
    userid INTEGER PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    passwd TEXT NOT NULL,
    attempt_failed INTEGER NOT NULL DEFAULT 0,
    attempt_clock INTEGER NOT NULL DEFAULT 0,
    lang TEXT NOT NULL DEFAULT 'en_US',
    autologin INTEGER NOT NULL DEFAULT 0
);
INSERT INTO users (userid, username, passwd) VALUES
    (1, 'Admin', 'zabbix'),
    (2, 'guest', ''),
    (9, 'user-for-blocking', 'zabbix12345');

CREATE TABLE hstgrp (
    groupid INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
INSERT INTO hstgrp (groupid, name) VALUES
    (1, 'Templates'),
    (2, 'Linux servers'),
    (4, 'Zabbix servers'),
    (5, 'Discovered hosts');

CREATE TABLE hosts (
    hostid INTEGER PRIMARY KEY,
    host TEXT NOT NULL UNIQUE
);
INSERT INTO hosts (hostid, host) VALUES (10084, 'Zabbix server');

CREATE TABLE hosts_groups (
    hostid INTEGER NOT NULL,
    groupid INTEGER NOT NULL
);
INSERT INTO hosts_groups (hostid, groupid) VALUES (10084, 4);

CREATE TABLE host_tag (
    hosttagid INTEGER PRIMARY KEY,
    hostid INTEGER NOT NULL,
    tag TEXT NOT NULL,
    value TEXT NOT NULL DEFAULT ''
);
INSERT INTO host_tag (hostid, tag, value) VALUES (10084, 'class', 'os');
"#;

// ---------------------------------------------------------------------------
// Element tree

#[derive(Debug, Clone, PartialEq)]
enum Action {
    None,
    Go(String),
    Submit(&'static str),
    Toggle,
    Choose,
}

/// Element under construction
#[derive(Debug, Clone)]
pub struct El {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<El>,
    displayed: bool,
    action: Action,
    checked: bool,
    value: String,
}

fn el(tag: &str) -> El {
    El {
        tag: tag.to_string(),
        attrs: BTreeMap::new(),
        text: String::new(),
        children: Vec::new(),
        displayed: true,
        action: Action::None,
        checked: false,
        value: String::new(),
    }
}

impl El {
    fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    fn name(self, name: &str) -> Self {
        self.attr("name", name)
    }

    fn attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    fn child(mut self, child: El) -> Self {
        self.children.push(child);
        self
    }

    fn children(mut self, children: impl IntoIterator<Item = El>) -> Self {
        self.children.extend(children);
        self
    }

    fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    fn go(mut self, url: &str) -> Self {
        self.action = Action::Go(url.to_string());
        self
    }

    fn submit(mut self, form: &'static str) -> Self {
        self.action = Action::Submit(form);
        self
    }

    fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }
}

fn input(id: &str) -> El {
    el("input").id(id).name(id).attr("type", "text")
}

fn checkbox(id: &str, checked: bool) -> El {
    let mut e = el("input").id(id).name(id).attr("type", "checkbox");
    e.action = Action::Toggle;
    e.checked = checked;
    e
}

fn select(id: &str, options: &[(&str, &str)], selected: &str) -> El {
    let mut e = el("select").id(id).name(id).value(selected);
    for (value, label) in options {
        let mut option = el("option").attr("value", value).text(label);
        option.action = Action::Choose;
        e = e.child(option);
    }
    e
}

fn button(id: &str, label: &str) -> El {
    el("button").id(id).attr("type", "submit").text(label)
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    children: Vec<usize>,
    parent: Option<usize>,
    displayed: bool,
    action: Action,
    checked: bool,
    value: String,
}

#[derive(Debug, Clone)]
struct Page {
    url: String,
    title: String,
    nodes: Vec<Node>,
}

impl Page {
    fn new(url: &str, title: &str, body: El) -> Self {
        let mut page = Page {
            url: url.to_string(),
            title: title.to_string(),
            nodes: Vec::new(),
        };
        page.add(el("html").child(body), None);
        page
    }

    fn add(&mut self, e: El, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node {
            tag: e.tag,
            attrs: e.attrs,
            text: e.text,
            children: Vec::new(),
            parent,
            displayed: e.displayed,
            action: e.action,
            checked: e.checked,
            value: e.value,
        });
        for child in e.children {
            let c = self.add(child, Some(index));
            self.nodes[index].children.push(c);
        }
        index
    }

    fn is_displayed(&self, index: usize) -> bool {
        let mut current = Some(index);
        while let Some(i) = current {
            if !self.nodes[i].displayed {
                return false;
            }
            current = self.nodes[i].parent;
        }
        true
    }

    fn text(&self, index: usize) -> String {
        if !self.is_displayed(index) {
            return String::new();
        }
        let node = &self.nodes[index];
        let mut parts = Vec::new();
        if !node.text.is_empty() {
            parts.push(node.text.clone());
        }
        for &child in &node.children {
            let t = self.text(child);
            if !t.is_empty() {
                parts.push(t);
            }
        }
        parts.join("\n")
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut current = self.nodes[index].parent;
        while let Some(i) = current {
            if i == ancestor {
                return true;
            }
            current = self.nodes[i].parent;
        }
        false
    }

    fn by_id(&self, id: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.attrs.get("id").map(String::as_str) == Some(id))
    }

    fn by_name(&self, name: &str) -> Option<usize> {
        self.nodes
            .iter()
            .position(|n| n.attrs.get("name").map(String::as_str) == Some(name))
    }

    fn field(&self, name: &str) -> String {
        self.by_name(name)
            .map(|i| self.nodes[i].value.clone())
            .unwrap_or_default()
    }

    fn set_field(&mut self, name: &str, value: &str) {
        if let Some(i) = self.by_name(name) {
            self.nodes[i].value = value.to_string();
        }
    }

    fn query(&self, param: &str) -> Option<String> {
        query_param(&self.url, param)
    }

    fn find(&self, locator: &Locator) -> E2eResult<Vec<usize>> {
        let matches: Vec<usize> = match locator {
            Locator::Id(v) => self.filter(|n| n.attrs.get("id") == Some(v)),
            Locator::Name(v) => self.filter(|n| n.attrs.get("name") == Some(v)),
            Locator::ClassName(v) => self.filter(|n| has_class(n, v)),
            Locator::LinkText(v) => (0..self.nodes.len())
                .filter(|&i| self.nodes[i].tag == "a" && self.text(i).trim() == v)
                .collect(),
            Locator::PartialLinkText(v) => (0..self.nodes.len())
                .filter(|&i| self.nodes[i].tag == "a" && self.text(i).contains(v.as_str()))
                .collect(),
            Locator::Css(v) => {
                let selector = parse_selector(v).ok_or_else(|| E2eError::WebDriver {
                    code: "invalid selector".to_string(),
                    message: format!("unsupported selector {:?}", v),
                })?;
                (0..self.nodes.len())
                    .filter(|&i| self.matches_chain(i, &selector))
                    .collect()
            }
            Locator::XPath(v) => {
                return Err(E2eError::WebDriver {
                    code: "invalid selector".to_string(),
                    message: format!("xpath not supported by the fake: {}", v),
                })
            }
        };
        Ok(matches)
    }

    fn filter(&self, predicate: impl Fn(&Node) -> bool) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&i| predicate(&self.nodes[i]))
            .collect()
    }

    fn matches_chain(&self, index: usize, chain: &[Compound]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !last.matches(&self.nodes[index]) {
            return false;
        }
        let mut remaining = rest;
        let mut current = self.nodes[index].parent;
        while let Some((wanted, before)) = remaining.split_last() {
            loop {
                let Some(i) = current else {
                    return false;
                };
                current = self.nodes[i].parent;
                if wanted.matches(&self.nodes[i]) {
                    break;
                }
            }
            remaining = before;
        }
        true
    }
}

fn has_class(node: &Node, class: &str) -> bool {
    node.attrs
        .get("class")
        .map(|c| c.split_whitespace().any(|x| x == class))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// A small CSS subset: tag, #id, .class, [attr], [attr=v], [attr~=v] and
// descendant combinators.

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, AttrOp)>,
}

#[derive(Debug)]
enum AttrOp {
    Present,
    Equals(String),
    Word(String),
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if &node.tag != tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| has_class(node, c)) {
            return false;
        }
        self.attrs.iter().all(|(name, op)| match (node.attrs.get(name), op) {
            (None, _) => false,
            (Some(_), AttrOp::Present) => true,
            (Some(v), AttrOp::Equals(want)) => v == want,
            (Some(v), AttrOp::Word(want)) => v.split_whitespace().any(|w| w == want),
        })
    }
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_selector(selector: &str) -> Option<Vec<Compound>> {
    let chars: Vec<char> = selector.chars().collect();
    let mut chain = Vec::new();
    let mut current = Compound::default();
    let mut started = false;
    let mut i = 0;

    let ident = |i: &mut usize| -> String {
        let start = *i;
        while *i < chars.len() && is_ident(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            if started {
                chain.push(std::mem::take(&mut current));
                started = false;
            }
            i += 1;
            continue;
        }
        match c {
            '#' => {
                i += 1;
                current.id = Some(ident(&mut i));
            }
            '.' => {
                i += 1;
                current.classes.push(ident(&mut i));
            }
            '[' => {
                i += 1;
                let name = ident(&mut i);
                let op = match chars.get(i) {
                    Some(']') => {
                        i += 1;
                        current.attrs.push((name, AttrOp::Present));
                        started = true;
                        continue;
                    }
                    Some('=') => {
                        i += 1;
                        "="
                    }
                    Some('~') if chars.get(i + 1) == Some(&'=') => {
                        i += 2;
                        "~="
                    }
                    _ => return None,
                };
                let mut value = String::new();
                if chars.get(i) == Some(&'"') {
                    i += 1;
                    while i < chars.len() && chars[i] != '"' {
                        if chars[i] == '\\' && i + 1 < chars.len() {
                            i += 1;
                        }
                        value.push(chars[i]);
                        i += 1;
                    }
                    i += 1;
                } else {
                    while i < chars.len() && chars[i] != ']' {
                        value.push(chars[i]);
                        i += 1;
                    }
                }
                if chars.get(i) != Some(&']') {
                    return None;
                }
                i += 1;
                let op = if op == "=" {
                    AttrOp::Equals(value)
                } else {
                    AttrOp::Word(value)
                };
                current.attrs.push((name, op));
            }
            c if is_ident(c) => current.tag = Some(ident(&mut i)),
            _ => return None,
        }
        started = true;
    }
    if started {
        chain.push(current);
    }
    if chain.is_empty() {
        None
    } else {
        Some(chain)
    }
}

// ---------------------------------------------------------------------------
// The frontend

struct Flash {
    good: bool,
    title: String,
    details: Vec<String>,
}

struct App {
    db: Connection,
    start: Instant,
    user: Option<String>,
    flash: Option<Flash>,
    failed_notice: Option<i64>,
    login_error: Option<String>,
    injected: BTreeMap<String, String>,
}

fn path_of(url: &str) -> &str {
    url.split('?').next().unwrap_or("")
}

fn query_param(url: &str, param: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == param)
        .map(|(_, v)| v.to_string())
}

impl App {
    fn clock(&self) -> i64 {
        self.start.elapsed().as_secs() as i64
    }

    fn render(&mut self, url: &str) -> Page {
        let path = path_of(url);
        if path.is_empty() || path == "index.php" {
            return match self.user.clone() {
                Some(_) => self.render("zabbix.php?action=dashboard.view"),
                None => self.login_page(url),
            };
        }
        if self.user.is_none() {
            return self.login_page(url);
        }

        let action = query_param(url, "action");
        let form = query_param(url, "form");
        match (path, action.as_deref(), form.as_deref()) {
            ("zabbix.php", Some("dashboard.view"), _) => self.dashboard(url),
            ("zabbix.php", Some("userprofile.edit"), _) => self.profile(url),
            ("hostgroups.php", _, Some("create")) => self.group_form(url),
            ("hostgroups.php", _, _) => self.group_list(url),
            ("hosts.php", _, Some("update")) => self.host_form(url, query_param(url, "hostid")),
            _ => self.layout(url, "Page not found", vec![el("p").text("The requested page does not exist.")]),
        }
    }

    fn layout(&mut self, url: &str, header: &str, content: Vec<El>) -> Page {
        let mut body = el("body").child(
            el("nav").child(
                el("ul").children([
                    el("li").child(el("a").text("Host groups").go("hostgroups.php")),
                    el("li").child(el("a").text("User settings").go("zabbix.php?action=userprofile.edit")),
                    el("li").child(el("a").class("top-nav-signout").text("Sign out").submit("logout")),
                ]),
            ),
        );

        if let Some(flash) = self.flash.take() {
            let class = if flash.good { "msg-good" } else { "msg-bad" };
            let mut banner = el("output").class(class).child(el("span").text(&flash.title));
            if !flash.details.is_empty() {
                banner = banner.child(
                    el("div")
                        .class("msg-details")
                        .child(el("ul").children(flash.details.iter().map(|d| el("li").text(d)))),
                );
            }
            body = body.child(banner);
        }

        body = body.child(el("main").child(el("h1").text(header)).children(content));
        self.finish(url, header, body)
    }

    fn finish(&self, url: &str, title: &str, mut body: El) -> Page {
        if let Some(marker) = self.injected.get(path_of(url)) {
            body = body.child(el("div").text(marker));
        }
        body = body.child(el("footer").text("© 2001–2026, Zabbix SIA"));
        Page::new(url, &format!("Zabbix: {}", title), body)
    }

    fn login_page(&mut self, url: &str) -> Page {
        let mut form = el("form").children([
            el("label").text("Username"),
            input("name"),
            el("label").text("Password"),
            input("password").attr("type", "password"),
        ]);
        if let Some(error) = self.login_error.take() {
            form = form.child(el("div").class("red").text(&error));
        }
        form = form.children([
            checkbox("autologin", true),
            button("enter", "Sign in").submit("login"),
        ]);
        let body = el("body").child(el("main").child(form));
        let mut page = self.finish(url, "", body);
        page.title = "Zabbix".to_string();
        page
    }

    fn dashboard(&mut self, url: &str) -> Page {
        let mut content = vec![el("div").class("dashboard-grid").text("System information")];
        if let Some(n) = self.failed_notice.take() {
            content.insert(
                0,
                el("div").class("msg-warning").text(&format!("{} failed login attempts logged.", n)),
            );
        }
        self.layout(url, "Global view", content)
    }

    fn profile(&mut self, url: &str) -> Page {
        let user = self.user.clone().unwrap_or_default();
        let (lang, autologin): (String, i64) = self
            .db
            .query_row(
                "SELECT lang, autologin FROM users WHERE username = ?1",
                params![user],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap_or_else(|_| ("en_US".to_string(), 0));

        let form = el("form").children([
            el("label").text("Language"),
            select(
                "lang",
                &[("en_US", "English (en_US)"), ("ru_RU", "Russian (ru_RU)"), ("lv_LV", "Latvian (lv_LV)")],
                &lang,
            ),
            el("label").text("Auto-login"),
            checkbox("autologin", autologin != 0),
            button("update", "Update").submit("profile_update"),
        ]);
        self.layout(url, "User profile", vec![form])
    }

    fn group_list(&mut self, url: &str) -> Page {
        let mut stmt = match self.db.prepare(
            "SELECT g.name, COUNT(hg.hostid) FROM hstgrp g
             LEFT JOIN hosts_groups hg ON hg.groupid = g.groupid
             GROUP BY g.groupid ORDER BY g.name",
        ) {
            Ok(stmt) => stmt,
            Err(e) => panic!("fake frontend query failed: {}", e),
        };
        let groups: Vec<(String, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .and_then(|rows| rows.collect())
            .unwrap_or_default();
        drop(stmt);

        let rows = groups.into_iter().map(|(name, hosts)| {
            let hosts = if hosts > 0 { format!("Hosts {}", hosts) } else { "Hosts".to_string() };
            el("tr").children([
                el("td").child(checkbox(&format!("groupids_{}", name), false)),
                el("td").child(el("a").text(&name)),
                el("td").text(&hosts),
                el("td"),
            ])
        });

        let table = el("table").class("list-table").children([
            el("thead").child(el("tr").children([
                el("th"),
                el("th").text("Name"),
                el("th").text("Hosts"),
                el("th").text("Info"),
            ])),
            el("tbody").children(rows),
        ]);

        let content = vec![
            button("create", "Create host group").go("hostgroups.php?form=create"),
            el("div").class("filter-container").hidden().text("Filter"),
            table,
        ];
        self.layout(url, "Host groups", content)
    }

    fn group_form(&mut self, url: &str) -> Page {
        let form = el("form").children([
            el("label").text("Group name"),
            input("name"),
            checkbox("subgroups", false),
            button("add", "Add").submit("group_add"),
            button("cancel", "Cancel").go("hostgroups.php"),
        ]);
        self.layout(url, "Host groups", vec![form])
    }

    fn host_form(&mut self, url: &str, hostid: Option<String>) -> Page {
        let hostid: i64 = hostid.and_then(|h| h.parse().ok()).unwrap_or(0);
        let host: Option<String> = self
            .db
            .query_row("SELECT host FROM hosts WHERE hostid = ?1", params![hostid], |r| r.get(0))
            .optional()
            .unwrap_or(None);
        let Some(host) = host else {
            self.flash = Some(Flash {
                good: false,
                title: "No permissions to referred object or it does not exist!".to_string(),
                details: Vec::new(),
            });
            return self.layout(url, "Hosts", Vec::new());
        };

        let form = el("form").children([
            el("label").text("Host name"),
            input("host").value(&host),
            el("table").id("tags-table").children([
                el("thead").child(el("tr").children([el("th").text("Name"), el("th").text("Value")])),
                el("tbody").child(el("tr").children([
                    el("td").child(el("input").name("tags[0][tag]").attr("type", "text")),
                    el("td").child(el("input").name("tags[0][value]").attr("type", "text")),
                ])),
            ]),
            button("update", "Update").submit("host_update"),
        ]);
        self.layout(url, "Hosts", vec![form])
    }

    /// Handle a form submit; returns the page to show next
    fn submit(&mut self, form: &str, page: &Page) -> Page {
        match form {
            "login" => self.login(&page.field("name"), &page.field("password"), &page.url),
            "logout" => {
                self.user = None;
                self.render("index.php")
            }
            "group_add" => self.group_add(page),
            "host_update" => self.host_update(page),
            "profile_update" => self.profile_update(page),
            other => panic!("unknown form {}", other),
        }
    }

    fn login(&mut self, username: &str, password: &str, url: &str) -> Page {
        let clock = self.clock();
        let row: Option<(String, i64, i64)> = self
            .db
            .query_row(
                "SELECT passwd, attempt_failed, attempt_clock FROM users WHERE username = ?1",
                params![username],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .unwrap_or(None);

        let Some((passwd, failed, failed_clock)) = row else {
            self.login_error = Some("Login name or password is incorrect.".to_string());
            return self.login_page(url);
        };

        let elapsed = clock - failed_clock;
        if failed >= LOGIN_ATTEMPTS && elapsed < LOGIN_BLOCK_SECS {
            self.login_error = Some(format!("Account is blocked for {} seconds.", LOGIN_BLOCK_SECS - elapsed));
            return self.login_page(url);
        }

        if passwd != password {
            self.exec(
                "UPDATE users SET attempt_failed = attempt_failed + 1, attempt_clock = ?1 WHERE username = ?2",
                params![clock, username],
            );
            self.login_error = Some("Login name or password is incorrect.".to_string());
            return self.login_page(url);
        }

        if failed > 0 {
            self.failed_notice = Some(failed);
        }
        self.exec("UPDATE users SET attempt_failed = 0 WHERE username = ?1", params![username]);
        self.user = Some(username.to_string());
        self.render("zabbix.php?action=dashboard.view")
    }

    fn group_add(&mut self, page: &Page) -> Page {
        let name = page.field("name").trim().to_string();
        let error = if name.is_empty() {
            Some("Incorrect value for field \"Name\": cannot be empty.".to_string())
        } else {
            let exists: i64 = self
                .db
                .query_row("SELECT COUNT(*) FROM hstgrp WHERE name = ?1", params![name], |r| r.get(0))
                .unwrap_or(0);
            (exists > 0).then(|| format!("Host group \"{}\" already exists.", name))
        };

        if let Some(detail) = error {
            self.flash = Some(Flash {
                good: false,
                title: "Cannot add group".to_string(),
                details: vec![detail],
            });
            let mut form = self.group_form(&page.url);
            form.set_field("name", &page.field("name"));
            return form;
        }

        self.exec("INSERT INTO hstgrp (name) VALUES (?1)", params![name]);
        self.flash = Some(Flash {
            good: true,
            title: "Group added".to_string(),
            details: Vec::new(),
        });
        self.render("hostgroups.php")
    }

    fn host_update(&mut self, page: &Page) -> Page {
        let hostid: i64 = page.query("hostid").and_then(|h| h.parse().ok()).unwrap_or(0);
        let tag = page.field("tags[0][tag]");
        let value = page.field("tags[0][value]");

        if tag.trim().is_empty() && !value.is_empty() {
            self.flash = Some(Flash {
                good: false,
                title: "Cannot update host".to_string(),
                details: vec!["Invalid parameter \"/tags/1/tag\": cannot be empty.".to_string()],
            });
            let mut form = self.render(&page.url);
            form.set_field("tags[0][value]", &value);
            return form;
        }

        if !tag.trim().is_empty() {
            self.exec(
                "INSERT INTO host_tag (hostid, tag, value) VALUES (?1, ?2, ?3)",
                params![hostid, tag, value],
            );
        }
        self.flash = Some(Flash {
            good: true,
            title: "Host updated".to_string(),
            details: Vec::new(),
        });
        self.render(&page.url)
    }

    fn profile_update(&mut self, page: &Page) -> Page {
        let user = self.user.clone().unwrap_or_default();
        let autologin = page.by_id("autologin").map(|i| page.nodes[i].checked).unwrap_or(false);
        self.exec(
            "UPDATE users SET lang = ?1, autologin = ?2 WHERE username = ?3",
            params![page.field("lang"), autologin as i64, user],
        );
        self.flash = Some(Flash {
            good: true,
            title: "User updated".to_string(),
            details: Vec::new(),
        });
        self.render("zabbix.php?action=userprofile.edit")
    }

    fn exec(&self, sql: &str, params: impl rusqlite::Params) {
        if let Err(e) = self.db.execute(sql, params) {
            panic!("fake frontend write failed: {}: {}", sql, e);
        }
    }
}

// ---------------------------------------------------------------------------
// Driver

struct State {
    app: App,
    page: Page,
    generation: u64,
    loading_per_navigation: u32,
    loading_left: u32,
    navigations: u64,
    submits: Vec<String>,
}

pub struct FakeBrowser {
    state: Mutex<State>,
    db_path: PathBuf,
    _dir: tempfile::TempDir,
}

impl FakeBrowser {
    /// Must be called inside a tokio runtime so paused time applies
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("zabbix.db");
        let db = Connection::open(&db_path).expect("open fake database");
        db.execute_batch(SCHEMA).expect("fake schema");

        let app = App {
            db,
            start: Instant::now(),
            user: None,
            flash: None,
            failed_notice: None,
            login_error: None,
            injected: BTreeMap::new(),
        };

        Self {
            state: Mutex::new(State {
                app,
                page: Page::new("about:blank", "", el("body")),
                generation: 0,
                loading_per_navigation: 0,
                loading_left: 0,
                navigations: 0,
                submits: Vec::new(),
            }),
            db_path,
            _dir: dir,
        }
    }

    pub fn database(&self) -> Database {
        Database::open(&self.db_path).expect("open read-only database")
    }

    /// Change data behind the frontend's back, like an API fixture would
    pub fn execute_sql(&self, sql: &str) {
        let state = self.state.lock();
        state.app.db.execute_batch(sql).expect("fixture sql");
    }

    /// Append `text` to every rendering of `path`
    pub fn inject(&self, path: &str, text: &str) {
        self.state.lock().app.injected.insert(path.to_string(), text.to_string());
    }

    /// Report `document.readyState == "loading"` this many times after
    /// every page change
    pub fn set_loading_polls(&self, polls: u32) {
        self.state.lock().loading_per_navigation = polls;
    }

    pub fn navigations(&self) -> u64 {
        self.state.lock().navigations
    }

    /// Names of the forms submitted so far
    pub fn submits(&self) -> Vec<String> {
        self.state.lock().submits.clone()
    }

    pub fn logged_in_user(&self) -> Option<String> {
        self.state.lock().app.user.clone()
    }
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn show(&mut self, page: Page) {
        self.page = page;
        self.generation += 1;
        self.loading_left = self.loading_per_navigation;
        self.navigations += 1;
    }

    fn element_id(&self, index: usize) -> ElementId {
        ElementId(format!("{}-{}", self.generation, index))
    }

    fn resolve(&self, element: &ElementId) -> E2eResult<usize> {
        let stale = || E2eError::WebDriver {
            code: "stale element reference".to_string(),
            message: format!("element {} is not attached to the page", element),
        };
        let (generation, index) = element.0.split_once('-').ok_or_else(stale)?;
        if generation.parse::<u64>().ok() != Some(self.generation) {
            return Err(stale());
        }
        let index: usize = index.parse().map_err(|_| stale())?;
        if index >= self.page.nodes.len() {
            return Err(stale());
        }
        Ok(index)
    }
}

#[async_trait]
impl Driver for FakeBrowser {
    async fn navigate(&self, url: &str) -> E2eResult<()> {
        let relative = url
            .strip_prefix(BASE_URL)
            .ok_or_else(|| E2eError::WebDriver {
                code: "unknown error".to_string(),
                message: format!("cannot reach {}", url),
            })?
            .to_string();
        let mut state = self.state.lock();
        let page = state.app.render(&relative);
        state.show(page);
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        let state = self.state.lock();
        Ok(format!("{}{}", BASE_URL, state.page.url))
    }

    async fn title(&self) -> E2eResult<String> {
        Ok(self.state.lock().page.title.clone())
    }

    async fn find_elements(&self, locator: &Locator) -> E2eResult<Vec<ElementId>> {
        let state = self.state.lock();
        let found = state.page.find(locator)?;
        Ok(found.into_iter().map(|i| state.element_id(i)).collect())
    }

    async fn find_child_elements(&self, parent: &ElementId, locator: &Locator) -> E2eResult<Vec<ElementId>> {
        let state = self.state.lock();
        let parent = state.resolve(parent)?;
        let found = state.page.find(locator)?;
        Ok(found
            .into_iter()
            .filter(|&i| state.page.is_descendant(i, parent))
            .map(|i| state.element_id(i))
            .collect())
    }

    async fn click(&self, element: &ElementId) -> E2eResult<()> {
        let mut state = self.state.lock();
        let index = state.resolve(element)?;
        if !state.page.is_displayed(index) {
            return Err(E2eError::WebDriver {
                code: "element not interactable".to_string(),
                message: format!("element {} is hidden", element),
            });
        }

        match state.page.nodes[index].action.clone() {
            Action::None => {}
            Action::Go(url) => {
                let page = state.app.render(&url);
                state.show(page);
            }
            Action::Submit(form) => {
                state.submits.push(form.to_string());
                let current = state.page.clone();
                let page = state.app.submit(form, &current);
                state.show(page);
            }
            Action::Toggle => {
                let node = &mut state.page.nodes[index];
                node.checked = !node.checked;
            }
            Action::Choose => {
                let value = {
                    let node = &state.page.nodes[index];
                    node.attrs.get("value").cloned().unwrap_or_else(|| node.text.clone())
                };
                if let Some(parent) = state.page.nodes[index].parent {
                    state.page.nodes[parent].value = value;
                }
            }
        }
        Ok(())
    }

    async fn clear(&self, element: &ElementId) -> E2eResult<()> {
        let mut state = self.state.lock();
        let index = state.resolve(element)?;
        state.page.nodes[index].value.clear();
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        let index = state.resolve(element)?;
        state.page.nodes[index].value.push_str(text);
        Ok(())
    }

    async fn text(&self, element: &ElementId) -> E2eResult<String> {
        let state = self.state.lock();
        let index = state.resolve(element)?;
        Ok(state.page.text(index))
    }

    async fn attribute(&self, element: &ElementId, name: &str) -> E2eResult<Option<String>> {
        let state = self.state.lock();
        let index = state.resolve(element)?;
        let node = &state.page.nodes[index];
        Ok(match name {
            "value" if node.tag == "input" || node.tag == "select" => Some(node.value.clone()),
            _ => node.attrs.get(name).cloned(),
        })
    }

    async fn property(&self, element: &ElementId, name: &str) -> E2eResult<Option<Value>> {
        let state = self.state.lock();
        let index = state.resolve(element)?;
        let node = &state.page.nodes[index];
        Ok(match name {
            "value" => Some(Value::String(node.value.clone())),
            "checked" => Some(Value::Bool(node.checked)),
            _ => node.attrs.get(name).cloned().map(Value::String),
        })
    }

    async fn is_displayed(&self, element: &ElementId) -> E2eResult<bool> {
        let state = self.state.lock();
        let index = state.resolve(element)?;
        Ok(state.page.is_displayed(index))
    }

    async fn execute(&self, script: &str, _args: Vec<Value>) -> E2eResult<Value> {
        let mut state = self.state.lock();
        if script.contains("document.readyState") {
            if state.loading_left > 0 {
                state.loading_left -= 1;
                return Ok(Value::String("loading".to_string()));
            }
            return Ok(Value::String("complete".to_string()));
        }
        Ok(Value::Null)
    }

    async fn screenshot(&self) -> E2eResult<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn delete_all_cookies(&self) -> E2eResult<()> {
        self.state.lock().app.user = None;
        Ok(())
    }

    async fn quit(&self) -> E2eResult<()> {
        Ok(())
    }
}

/// A session on a fresh fake, plus a read-only view of its database
pub fn fake_session() -> (frontcheck_e2e::Session<FakeBrowser>, Database) {
    let browser = FakeBrowser::new();
    let db = browser.database();
    let session = frontcheck_e2e::Session::new(browser, BASE_URL).expect("session");
    (session, db)
}

/// A context on a fresh fake with the database attached
pub fn fake_context() -> frontcheck_e2e::Context<FakeBrowser> {
    let (session, db) = fake_session();
    frontcheck_e2e::Context::new(session).with_database(db)
}
