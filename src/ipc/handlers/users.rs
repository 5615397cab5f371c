use crate::access::Screen;
use crate::cache::{QueryCache, USERS_LIST, USERS_STATS};
use crate::import::Role;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, parse_role_param, require_db, require_screen};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, Connection};
use serde_json::{json, Value};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

struct UserFilter {
    role: Option<Role>,
    class_id: Option<String>,
    search: Option<String>,
    page: i64,
    page_size: i64,
    offset: i64,
}

impl UserFilter {
    fn from_params(params: &Value) -> Result<Self, HandlerErr> {
        let page = params.get("page").and_then(|v| v.as_i64()).unwrap_or(1);
        if page < 1 {
            return Err(HandlerErr::new("bad_params", "page must be >= 1"));
        }
        let page_size = params
            .get("pageSize")
            .and_then(|v| v.as_i64())
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(HandlerErr::new(
                "bad_params",
                format!("pageSize must be in 1..={}", MAX_PAGE_SIZE),
            ));
        }
        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            HandlerErr::new("bad_params", format!("page {} is out of range", page))
        })?;
        Ok(Self {
            role: parse_role_param(params, "role")?,
            class_id: get_optional_str(params, "classId"),
            search: get_optional_str(params, "search").map(|s| s.to_lowercase()),
            page,
            page_size,
            offset,
        })
    }

    fn cache_key(&self) -> String {
        QueryCache::key(
            USERS_LIST,
            &json!({
                "role": self.role.map(|r| r.as_str()),
                "classId": self.class_id,
                "search": self.search,
                "page": self.page,
                "pageSize": self.page_size
            }),
        )
    }

    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        if let Some(role) = self.role {
            clauses.push("u.role = ?");
            args.push(role.as_str().to_string());
        }
        if let Some(class_id) = &self.class_id {
            clauses.push("u.class_id = ?");
            args.push(class_id.clone());
        }
        if let Some(search) = &self.search {
            clauses.push(
                "(lower(u.first_name || ' ' || u.last_name) LIKE ? ESCAPE '\\' \
                 OR lower(COALESCE(u.email, '')) LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(search));
            args.push(pattern.clone());
            args.push(pattern);
        }
        if clauses.is_empty() {
            (String::new(), args)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), args)
        }
    }
}

/// `%`, `_` and the escape character itself match literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn query_users(conn: &Connection, filter: &UserFilter) -> Result<Value, HandlerErr> {
    let (where_sql, args) = filter.where_clause();
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM users u {}", where_sql),
        params_from_iter(args.iter()),
        |r| r.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT u.id, u.first_name, u.last_name, u.email, u.phone, u.role, u.roll_number,
                u.employee_id, u.class_id, c.name, c.section, u.created_at
         FROM users u
         LEFT JOIN classes c ON c.id = u.class_id
         {}
         ORDER BY u.last_name COLLATE NOCASE, u.first_name COLLATE NOCASE, u.id
         LIMIT {} OFFSET {}",
        where_sql,
        filter.page_size, filter.offset
    ))?;
    let users = stmt
        .query_map(params_from_iter(args.iter()), |r| {
            let class_name: Option<String> = r.get(9)?;
            let class_section: Option<String> = r.get(10)?;
            let class_display = class_name.map(|n| match class_section {
                Some(s) if !s.is_empty() => format!("{} {}", n, s),
                _ => n,
            });
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "firstName": r.get::<_, String>(1)?,
                "lastName": r.get::<_, String>(2)?,
                "email": r.get::<_, Option<String>>(3)?,
                "phone": r.get::<_, Option<String>>(4)?,
                "role": r.get::<_, String>(5)?,
                "rollNumber": r.get::<_, Option<String>>(6)?,
                "employeeId": r.get::<_, Option<String>>(7)?,
                "classId": r.get::<_, Option<String>>(8)?,
                "className": class_display,
                "createdAt": r.get::<_, String>(11)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "users": users,
        "total": total,
        "page": filter.page,
        "pageSize": filter.page_size
    }))
}

fn handle_users_list(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::Users) {
        return e.response(&req.id);
    }
    let filter = match UserFilter::from_params(&req.params) {
        Ok(f) => f,
        Err(e) => return e.response(&req.id),
    };
    let key = filter.cache_key();
    if let Some(hit) = state.cache.get(&key) {
        return ok(&req.id, hit.clone());
    }
    let result = match require_db(state).and_then(|conn| query_users(conn, &filter)) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    state.cache.put(key, result.clone());
    ok(&req.id, result)
}

fn query_stats(conn: &Connection) -> Result<Value, HandlerErr> {
    let mut by_role = serde_json::Map::new();
    for role in Role::ALL {
        by_role.insert(role.as_str().to_string(), json!(0));
    }
    let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut total = 0i64;
    for (role, count) in rows {
        total += count;
        by_role.insert(role, json!(count));
    }
    let unassigned: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'student' AND class_id IS NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(json!({
        "total": total,
        "byRole": by_role,
        "studentsWithoutClass": unassigned
    }))
}

fn handle_users_stats(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::Users) {
        return e.response(&req.id);
    }
    let key = QueryCache::key(USERS_STATS, &json!({}));
    if let Some(hit) = state.cache.get(&key) {
        return ok(&req.id, hit.clone());
    }
    let result = match require_db(state).and_then(query_stats) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    state.cache.put(key, result.clone());
    ok(&req.id, result)
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> Value {
    if let Err(e) = require_screen(state, Screen::Users) {
        return e.response(&req.id);
    }
    let user_id = match get_required_str(&req.params, "userId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let conn = match require_db(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    let deleted = match conn.execute("DELETE FROM users WHERE id = ?", [&user_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "user not found", None);
    }
    state.cache.invalidate(USERS_LIST);
    state.cache.invalidate(USERS_STATS);
    ok(&req.id, json!({ "ok": true }))
}


pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.stats" => Some(handle_users_stats(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        _ => None,
    }
}
