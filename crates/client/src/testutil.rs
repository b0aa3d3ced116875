//! Fixtures shared by backend tests.
//!
//! Both fixtures hold the same content: six work items (five published)
//! pointing at two categories and three tags, categories owned by people.

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_rusqlite::rusqlite;

/// (id, order, status, category, tags, en title, tr title)
type WorkItem = (&'static str, i64, &'static str, &'static str, &'static [&'static str], &'static str, &'static str);

const WORKITEMS: &[WorkItem] = &[
    ("w1", 3, "publish", "c1", &["t1", "t2"], "Mobile App", "Mobil Uygulama"),
    ("w2", 1, "publish", "c2", &["t2"], "Website Redesign", "Web Sitesi Yenileme"),
    ("w3", 5, "publish", "c1", &[], "App Store Launch", "Uygulama Mağazası Lansmanı"),
    ("w4", 2, "draft", "c2", &["t1"], "Draft App", "Taslak Uygulama"),
    ("w5", 4, "publish", "c1", &["t3"], "Brand Identity", "Marka Kimliği"),
    ("w6", 6, "publish", "c2", &["t1", "t3"], "Web App Audit", "Web Uygulama Denetimi"),
];

/// (id, owner, en name, tr name)
const CATEGORIES: &[(&str, &str, &str, &str)] =
    &[("c1", "p1", "Design", "Tasarım"), ("c2", "p2", "Development", "Geliştirme")];

const TAGS: &[(&str, &str)] = &[("t1", "rust"), ("t2", "web"), ("t3", "brand")];

const PEOPLE: &[(&str, &str)] = &[("p1", "Ada"), ("p2", "Linus")];

const TIMESTAMP: &str = "2024-01-01T00:00:00Z";

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub fn write_json(root: &Path, relative: &str, value: &Value) {
    write_file(root, relative, &serde_json::to_string_pretty(value).unwrap());
}

fn system(id: &str, status: &str) -> Value {
    json!({ "id": id, "createdAt": TIMESTAMP, "updatedAt": TIMESTAMP, "status": status, "scheduled": false })
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(base), Value::Object(extra)) = (base.as_object_mut(), extra) {
        base.extend(extra);
    }
    base
}

/// Work items in `locale` ("en" or "tr").
pub fn workitem_records(locale: &str) -> Vec<Value> {
    WORKITEMS
        .iter()
        .map(|&(id, order, status, category, tags, en, tr)| {
            let title = if locale == "tr" { tr } else { en };
            merge(
                system(id, status),
                json!({
                    "title": title,
                    "description": format!("{title} ({locale})"),
                    "order": order,
                    "category": category,
                    "tags": tags,
                }),
            )
        })
        .collect()
}

/// A JSON content root with models `workitems`, `workcategories`, `tags`
/// and `people`.
pub fn json_fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_json(
        root,
        "models/metadata.json",
        &json!([
            { "modelId": "workitems", "name": "Work Items", "localization": true },
            { "modelId": "workcategories", "name": "Work Categories", "localization": true },
            { "modelId": "tags", "name": "Tags", "localization": false },
            { "modelId": "people", "name": "People", "localization": false },
        ]),
    );
    write_json(
        root,
        "models/workitems.json",
        &json!([
            { "fieldId": "title", "fieldType": "string", "localized": true },
            { "fieldId": "description", "fieldType": "string", "localized": true },
            { "fieldId": "order", "fieldType": "number" },
            { "fieldId": "category", "fieldType": "relation", "componentId": "one-to-one",
              "options": { "reference": "workcategories" } },
            { "fieldId": "tags", "fieldType": "relation", "componentId": "one-to-many",
              "options": { "reference": "tags" } },
        ]),
    );
    write_json(
        root,
        "models/workcategories.json",
        &json!([
            { "fieldId": "name", "fieldType": "string", "localized": true },
            { "fieldId": "owner", "fieldType": "relation", "componentId": "one-to-one",
              "options": { "reference": "people" } },
        ]),
    );
    write_json(root, "models/tags.json", &json!([{ "fieldId": "label", "fieldType": "string" }]));
    write_json(root, "models/people.json", &json!([{ "fieldId": "name", "fieldType": "string" }]));

    for locale in ["en", "tr"] {
        write_json(root, &format!("content/workitems/{locale}.json"), &Value::Array(workitem_records(locale)));
        let categories: Vec<Value> = CATEGORIES
            .iter()
            .map(|&(id, owner, en, tr)| {
                let name = if locale == "tr" { tr } else { en };
                merge(system(id, "publish"), json!({ "name": name, "owner": owner }))
            })
            .collect();
        write_json(root, &format!("content/workcategories/{locale}.json"), &Value::Array(categories));
    }

    let tags: Vec<Value> =
        TAGS.iter().map(|&(id, label)| merge(system(id, "publish"), json!({ "label": label }))).collect();
    write_json(root, "content/tags/tags.json", &Value::Array(tags));

    let people: Vec<Value> =
        PEOPLE.iter().map(|&(id, name)| merge(system(id, "publish"), json!({ "name": name }))).collect();
    write_json(root, "content/people/people.json", &Value::Array(people));

    dir
}

const SCHEMA: &str = r#"
CREATE TABLE tbl_models (model_id TEXT PRIMARY KEY, name TEXT, localization INTEGER NOT NULL DEFAULT 0);
CREATE TABLE tbl_model_fields (
    model_id TEXT NOT NULL, field_id TEXT NOT NULL, field_type TEXT NOT NULL, component_id TEXT,
    localized INTEGER NOT NULL DEFAULT 0, reference TEXT, field_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE tbl_relations (
    id INTEGER PRIMARY KEY, source_model TEXT NOT NULL, source_id TEXT NOT NULL,
    target_model TEXT NOT NULL, target_id TEXT NOT NULL, field_id TEXT NOT NULL, type TEXT NOT NULL
);
CREATE TABLE tbl_workitems (
    id TEXT PRIMARY KEY, created_at TEXT, updated_at TEXT, status TEXT, scheduled INTEGER NOT NULL DEFAULT 0,
    "order" INTEGER, category_id TEXT
);
CREATE TABLE tbl_workitems_translations (id TEXT NOT NULL, locale TEXT NOT NULL, title TEXT, description TEXT);
CREATE TABLE tbl_workcategories (
    id TEXT PRIMARY KEY, created_at TEXT, updated_at TEXT, status TEXT, scheduled INTEGER NOT NULL DEFAULT 0,
    owner_id TEXT
);
CREATE TABLE tbl_workcategories_translations (id TEXT NOT NULL, locale TEXT NOT NULL, name TEXT);
CREATE TABLE tbl_tags (
    id TEXT PRIMARY KEY, created_at TEXT, updated_at TEXT, status TEXT, scheduled INTEGER NOT NULL DEFAULT 0,
    label TEXT
);
CREATE TABLE tbl_people (
    id TEXT PRIMARY KEY, created_at TEXT, updated_at TEXT, status TEXT, scheduled INTEGER NOT NULL DEFAULT 0,
    name TEXT
);

INSERT INTO tbl_models VALUES
    ('workitems', 'Work Items', 1), ('workcategories', 'Work Categories', 1),
    ('tags', 'Tags', 0), ('people', 'People', 0);
INSERT INTO tbl_model_fields VALUES
    ('workitems', 'title', 'string', NULL, 1, NULL, 0),
    ('workitems', 'description', 'string', NULL, 1, NULL, 1),
    ('workitems', 'order', 'number', NULL, 0, NULL, 2),
    ('workitems', 'category', 'relation', 'one-to-one', 0, 'workcategories', 3),
    ('workitems', 'tags', 'relation', 'one-to-many', 0, 'tags', 4),
    ('workcategories', 'name', 'string', NULL, 1, NULL, 0),
    ('workcategories', 'owner', 'relation', 'one-to-one', 0, 'people', 1),
    ('tags', 'label', 'string', NULL, 0, NULL, 0),
    ('people', 'name', 'string', NULL, 0, NULL, 0);
"#;

fn seed(conn: &rusqlite::Connection) {
    conn.execute_batch(SCHEMA).unwrap();

    let link = |source_model: &str, source: &str, target_model: &str, target: &str, field: &str, kind: &str| {
        conn.execute(
            "INSERT INTO tbl_relations (source_model, source_id, target_model, target_id, field_id, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![source_model, source, target_model, target, field, kind],
        )
        .unwrap();
    };

    for &(id, order, status, category, tags, en, tr) in WORKITEMS {
        conn.execute(
            r#"INSERT INTO tbl_workitems (id, created_at, updated_at, status, "order", category_id)
               VALUES (?1, ?2, ?2, ?3, ?4, ?5)"#,
            rusqlite::params![id, TIMESTAMP, status, order, category],
        )
        .unwrap();
        for (locale, title) in [("en", en), ("tr", tr)] {
            conn.execute(
                "INSERT INTO tbl_workitems_translations (id, locale, title, description) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, locale, title, format!("{title} ({locale})")],
            )
            .unwrap();
        }
        link("workitems", id, "workcategories", category, "category", "one-to-one");
        for &tag in tags {
            link("workitems", id, "tags", tag, "tags", "one-to-many");
        }
    }

    for &(id, owner, en, tr) in CATEGORIES {
        conn.execute(
            "INSERT INTO tbl_workcategories (id, created_at, updated_at, status, owner_id)
             VALUES (?1, ?2, ?2, 'publish', ?3)",
            rusqlite::params![id, TIMESTAMP, owner],
        )
        .unwrap();
        for (locale, name) in [("en", en), ("tr", tr)] {
            conn.execute(
                "INSERT INTO tbl_workcategories_translations (id, locale, name) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, locale, name],
            )
            .unwrap();
        }
        link("workcategories", id, "people", owner, "owner", "one-to-one");
    }

    for &(id, label) in TAGS {
        conn.execute(
            "INSERT INTO tbl_tags (id, created_at, updated_at, status, label) VALUES (?1, ?2, ?2, 'publish', ?3)",
            rusqlite::params![id, TIMESTAMP, label],
        )
        .unwrap();
    }
    for &(id, name) in PEOPLE {
        conn.execute(
            "INSERT INTO tbl_people (id, created_at, updated_at, status, name) VALUES (?1, ?2, ?2, 'publish', ?3)",
            rusqlite::params![id, TIMESTAMP, name],
        )
        .unwrap();
    }
}

/// A seeded database file; `extra_sql` runs after the seed data.
pub fn sqlite_fixture_with(extra_sql: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("content.sqlite");
    let conn = rusqlite::Connection::open(&path).unwrap();
    seed(&conn);
    if !extra_sql.is_empty() {
        conn.execute_batch(extra_sql).unwrap();
    }
    (dir, path)
}

pub fn sqlite_fixture() -> (TempDir, PathBuf) {
    sqlite_fixture_with("")
}
