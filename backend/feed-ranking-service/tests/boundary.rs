use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(read_dir) = fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                    files.push(path);
                }
            }
        }
    }
    files
}

fn offenders(dir: &str, needles: &[&str]) -> Vec<String> {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src").join(dir);
    collect_rs_files(&root)
        .into_iter()
        .filter(|file| {
            fs::read_to_string(file)
                .map(|c| needles.iter().any(|n| c.contains(n)))
                .unwrap_or(false)
        })
        .map(|file| file.to_string_lossy().to_string())
        .collect()
}

#[test]
fn sql_lives_only_in_db_module() {
    let src_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    let db_root = src_root.join("db");
    let mut found = Vec::new();
    for file in collect_rs_files(&src_root) {
        if file.starts_with(&db_root) {
            continue;
        }
        let content = fs::read_to_string(&file).unwrap_or_default();
        if content.contains("sqlx::query") || content.contains("FROM posts") {
            found.push(file.to_string_lossy().to_string());
        }
    }

    assert!(found.is_empty(), "SQL outside src/db: {:?}", found);
}

#[test]
fn handlers_go_through_services() {
    let found = offenders("handlers", &["PgPool", "ConnectionManager", "crate::db"]);
    assert!(
        found.is_empty(),
        "Handlers must not touch storage directly: {:?}",
        found
    );
}

#[test]
fn services_depend_on_store_traits_not_pools() {
    let found = offenders("services", &["PgPool", "ConnectionManager"]);
    assert!(found.is_empty(), "Services hold concrete pools: {:?}", found);
}
