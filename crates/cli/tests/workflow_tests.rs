// End-to-end tests for the process -> preview -> edit -> export workflow.
// Run with: cargo test -p fleetreport-cli --test workflow_tests -- --nocapture

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const SPB_MAIN: &str = "\
Номер заказа;Время заказа;Стоимость;Адрес;Исполнитель;Комментарий;Клиент;Доплата;Парк партнер
101;2024-03-02 12:00;2600;A) Санкт-Петербург, Пулково;;платные дороги 300 вкл +79111234567;Иванов;0;
102;2024-03-01 11:00;2200;A) Санкт-Петербург, Невский 2;;зсд 300 вкл;Петров;;
103;2024-03-03 13:00;3000;A) Санкт-Петербург, вокзал;Асонов;Сапсан наличные;;;
";

const SPB_PARTNERS: &str = "\
Номер заказа;Партнер
101;Парк Альфа
103;Парк Бета
";

const MSK_MAIN: &str = "\
Номер заказа;Время заказа;Стоимость;Адрес
201;2024-03-04 12:00;5000;A) Москва, Арбат
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn session(&self) -> PathBuf {
        self.dir.path().join("state").join("session.json")
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_fleetreport"))
            .args(args)
            .arg("--session")
            .arg(self.session())
            .env_remove("RUST_LOG")
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .output()
            .expect("run fleetreport")
    }

    fn process_spb(&self) -> Output {
        let main = self.file("spb.csv", SPB_MAIN);
        let partners = self.file("spb_parks.csv", SPB_PARTNERS);
        self.run(&[
            "process",
            "--spb",
            main.to_str().unwrap(),
            "--spb-partner",
            partners.to_str().unwrap(),
        ])
    }

    fn preview_json(&self, extra: &[&str]) -> serde_json::Value {
        let mut args = vec!["preview", "--json"];
        args.extend_from_slice(extra);
        let output = self.run(&args);
        assert!(output.status.success(), "preview failed: {}", stderr(&output));
        serde_json::from_slice(&output.stdout).expect("valid JSON")
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

fn archive_members(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// process
// ---------------------------------------------------------------------------

#[test]
fn process_reports_counts_and_writes_session() {
    let ws = Workspace::new();
    let output = ws.process_spb();
    assert!(output.status.success(), "process failed: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("processed 3 rows"), "{stdout}");
    assert!(ws.session().exists());
    // Lock released after the run
    assert!(!ws.dir.path().join("state").join("session.json.lock").exists());
}

#[test]
fn process_rejects_wrong_city() {
    let ws = Workspace::new();
    let main = ws.file("msk_as_spb.csv", MSK_MAIN);
    let output = ws.run(&["process", "--spb", main.to_str().unwrap()]);
    assert_eq!(code(&output), 10, "{}", stderr(&output));
    assert!(stderr(&output).contains("санкт-петербург"));
    assert!(!ws.session().exists());
}

#[test]
fn process_missing_file_is_io_error() {
    let ws = Workspace::new();
    let output = ws.run(&["process", "--spb", "/nonexistent/orders.csv"]);
    assert_eq!(code(&output), 3);
}

#[test]
fn process_empty_csv_is_parse_error() {
    let ws = Workspace::new();
    let main = ws.file("empty.csv", "");
    let output = ws.run(&["process", "--spb", main.to_str().unwrap()]);
    assert_eq!(code(&output), 4);
    assert!(stderr(&output).contains("CSV file is empty"));
}

#[test]
fn process_refuses_while_locked() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.session().parent().unwrap()).unwrap();
    fs::write(ws.dir.path().join("state").join("session.json.lock"), "1").unwrap();

    let output = ws.process_spb();
    assert_eq!(code(&output), 12, "{}", stderr(&output));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn process_two_city_combines_files() {
    let ws = Workspace::new();
    let spb = ws.file("spb.csv", SPB_MAIN);
    let msk = ws.file("msk.csv", MSK_MAIN);
    let output = ws.run(&["process", "--spb", spb.to_str().unwrap(), "--msk", msk.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));

    let doc = ws.preview_json(&[]);
    assert_eq!(doc["total"], 4);
    // Preset layout renames the partner column
    let first = &doc["rows"][0]["cells"];
    assert!(first.get("Парк партнёр").is_some(), "{first}");
}

// ---------------------------------------------------------------------------
// preview / edit
// ---------------------------------------------------------------------------

#[test]
fn preview_shows_pipeline_result_in_time_order() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());

    let doc = ws.preview_json(&[]);
    assert_eq!(doc["title"], "Отчёт за период 01.03.2024 - 03.03.2024");
    assert_eq!(doc["sort"]["column"], "Время заказа");

    let rows = doc["rows"].as_array().unwrap();
    let orders: Vec<&str> = rows.iter().map(|r| r["cells"]["Номер заказа"].as_str().unwrap()).collect();
    assert_eq!(orders, vec!["102", "101", "103"]);

    // 102: cost under the SPB minimum
    assert_eq!(rows[0]["flags"]["value_error"], true);
    // 101: toll moved to the extra payment, phone stripped, client blanked
    assert_eq!(rows[1]["cells"]["Стоимость"], "2300");
    assert_eq!(rows[1]["cells"]["Доплата"], "300");
    assert_eq!(rows[1]["cells"]["Комментарий"], "платные дороги 300 вкл");
    assert_eq!(rows[1]["cells"]["Клиент"], "");
    assert_eq!(rows[1]["cells"]["Парк партнер"], "Парк Альфа");
    // 103: Sapsan cash
    assert_eq!(rows[2]["flags"]["sapsan"], true);
    assert_eq!(rows[2]["cells"]["Время заказа"], "03.03.2024 10:00");
}

#[test]
fn preview_filter_and_sort() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());

    let doc = ws.preview_json(&["--filter", "Стоимость:greaterThan:2250"]);
    assert_eq!(doc["visible"], 2);

    let doc = ws.preview_json(&["--sort", "Стоимость", "--sort", "Стоимость"]);
    let first = doc["rows"][0]["cells"]["Номер заказа"].as_str().unwrap().to_string();
    assert_eq!(first, "103");
}

#[test]
fn preview_unknown_column_is_usage_error() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());
    let output = ws.run(&["preview", "--sort", "Нет такой"]);
    assert_eq!(code(&output), 2);
    assert!(stderr(&output).contains("columns:"));
}

#[test]
fn edit_persists_and_keeps_flags() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());

    let output = ws.run(&["edit", "--row", "0", "--column", "Стоимость", "--value", "2500"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("'2200' -> '2500'"));

    let doc = ws.preview_json(&[]);
    assert_eq!(doc["rows"][0]["cells"]["Стоимость"], "2500");
    assert_eq!(doc["rows"][0]["flags"]["value_error"], true);
}

#[test]
fn edit_out_of_range_row() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());
    let output = ws.run(&["edit", "--row", "99", "--column", "Стоимость", "--value", "1"]);
    assert_eq!(code(&output), 2);
}

#[test]
fn commands_without_session() {
    let ws = Workspace::new();
    let output = ws.run(&["preview"]);
    assert_eq!(code(&output), 11);
    assert!(stderr(&output).contains("fleetreport process"));
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

#[test]
fn export_writes_archive_and_clears_session() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());

    let out = ws.out();
    let output = ws.run(&["export", "--out", out.to_str().unwrap(), "--general"]);
    assert!(output.status.success(), "{}", stderr(&output));

    let archive = out.join("отчёты_по_паркам_за_период_01.03.2024_03.03.2024.zip");
    assert!(archive.exists(), "{:?}", fs::read_dir(&out).unwrap().collect::<Vec<_>>());

    let members = archive_members(&archive);
    assert_eq!(members.len(), 4, "{members:?}");
    assert!(members.contains(&"отчёт_за_период_01.03.2024_03.03.2024_по_Парк Альфа.xlsx".to_string()));
    assert!(members.contains(&"отчёт_за_период_01.03.2024_03.03.2024_по_без парка.xlsx".to_string()));
    assert!(members.contains(&"общий_отчёт_за_период_01.03.2024_03.03.2024.xlsx".to_string()));

    assert!(!ws.session().exists());
}

#[test]
fn export_keep_and_general_only() {
    let ws = Workspace::new();
    assert!(ws.process_spb().status.success());

    let out = ws.out();
    let output = ws.run(&["export", "--out", out.to_str().unwrap(), "--general-only", "--keep"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(out.join("общий_отчёт_за_период_01.03.2024_03.03.2024.xlsx").exists());

    let session: serde_json::Value = serde_json::from_str(&fs::read_to_string(ws.session()).unwrap()).unwrap();
    assert_eq!(session["stage"], "exported");
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_prints_defaults_and_rejects_invalid() {
    let ws = Workspace::new();
    let output = ws.run(&["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("spb_base = 2250"), "{stdout}");

    let bad = ws.file("bad.toml", "[commission]\nmsk = 1.5\n");
    let output = ws.run(&["config", "--config", bad.to_str().unwrap()]);
    assert_eq!(code(&output), 2);
    assert!(stderr(&output).contains("commission.msk"));
}
