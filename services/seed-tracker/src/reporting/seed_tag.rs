use super::yes_no;
use crate::errors::{Result, SeedTrackerError};
use crate::models::BatchView;
use printpdf::{BuiltinFont, Mm, PdfDocument};

// A4 portrait
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_GAP: f32 = 10.0;
const TITLE_SIZE: f32 = 24.0;
const BODY_SIZE: f32 = 14.0;

fn pdf_error<E: std::fmt::Debug>(err: E) -> SeedTrackerError {
    SeedTrackerError::Report(format!("PDF error: {:?}", err))
}

/// Text lines printed under the seed name.
pub fn tag_lines(view: &BatchView) -> Vec<String> {
    let batch = &view.batch;
    vec![
        format!("Batch Number: {}", batch.batch_number),
        format!("Weight (current): {:.2} g", batch.weight_grams),
        format!("Sell By Date: {}", batch.sell_by_date.format("%Y-%m-%d")),
        format!(
            "Recommended to Process: {}",
            yes_no(view.recommended_to_process)
        ),
    ]
}

/// Single-page printable tag for a batch.
pub fn seed_tag_pdf(view: &BatchView) -> Result<Vec<u8>> {
    let title = format!("Seed tag {}", view.batch.batch_number);
    let (doc, page, layer) =
        PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Tag");

    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_error)?;
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(pdf_error)?;

    let canvas = doc.get_page(page).get_layer(layer);

    let top = PAGE_HEIGHT - MARGIN;
    canvas.use_text(
        view.batch.seed_name.clone(),
        TITLE_SIZE,
        Mm(MARGIN),
        Mm(top),
        &bold,
    );

    let mut y = top;
    for line in tag_lines(view) {
        y -= LINE_GAP;
        canvas.use_text(line, BODY_SIZE, Mm(MARGIN), Mm(y), &regular);
    }

    doc.save_to_bytes().map_err(pdf_error)
}
