// Shared fixtures: price report workbooks shaped like the published hourly reports

use std::path::Path;

use rust_xlsxwriter::Workbook;

pub const REGION_COLUMN: &str = "Субъект РФ";
pub const PRICE_COLUMN: &str = "Цена, руб/МВт*ч";

/// One hour sheet: its name and the (region, price) rows it holds
pub type HourSheet<'a> = (&'a str, &'a [(&'a str, f64)]);

/// Build report bytes with two title rows, a header row and one row per node
pub fn report_bytes(sheets: &[HourSheet]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).unwrap();
        worksheet
            .write_string(0, 0, "Равновесные цены в узлах расчетной модели")
            .unwrap();
        worksheet.write_string(1, 0, "Ценовая зона: 1").unwrap();

        let headers = ["Номер узла", "Наименование узла", REGION_COLUMN, PRICE_COLUMN];
        for (col, header) in headers.iter().enumerate() {
            worksheet.write_string(2, col as u16, *header).unwrap();
        }

        for (i, (region, price)) in rows.iter().enumerate() {
            let row = 3 + i as u32;
            worksheet.write_number(row, 0, (i + 1) as f64).unwrap();
            worksheet
                .write_string(row, 1, format!("Узел {}", i + 1))
                .unwrap();
            worksheet.write_string(row, 2, *region).unwrap();
            worksheet.write_number(row, 3, *price).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

pub fn write_report(path: &Path, sheets: &[HourSheet]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, report_bytes(sheets)).unwrap();
}
