//! 採購單 XML（倉儲系統的固定格式）

use crate::domain::model::{OrderHeader, OrderLine};

/// 跳脫 XML 文字內容
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_line(line: &OrderLine) -> String {
    let d = &line.descriptor;
    format!(
        "
\t\t<Satir>
\t\t\t<SIRANO>{}</SIRANO>
\t\t\t<KARTTIPI>S</KARTTIPI>
\t\t\t<STOKKOD>{}</STOKKOD>
\t\t\t<STOKADI>{}</STOKADI>
\t\t\t<MIKTAR>{}</MIKTAR>
\t\t\t<BIRIMKOD>{}</BIRIMKOD>
\t\t\t<SEMBOL>TL</SEMBOL>
\t\t\t<KUR_YEREL>1</KUR_YEREL>
\t\t\t<VADE_TARIHI>{}</VADE_TARIHI>
\t\t\t<KDVORANI>{}</KDVORANI>
\t\t\t<DEPOKOD>{}</DEPOKOD>
\t\t\t<OZELALAN1>{}</OZELALAN1>
\t\t\t<ID>{}</ID>
\t\t</Satir>",
        line.line_number,
        escape(&d.stock_code),
        escape(&d.stock_name),
        line.quantity(),
        escape(&d.unit_code),
        escape(&d.due_date),
        escape(&d.vat_rate),
        escape(&d.warehouse_code),
        escape(&line.resolved.package_label),
        escape(&d.external_id),
    )
}

pub fn render_purchase_order(header: &OrderHeader, lines: &[OrderLine]) -> String {
    let rows: String = lines.iter().map(render_line).collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<Fis>
\t<OWNERID>{owner}</OWNERID>
\t<FISNO>{doc}</FISNO>
\t<CARIID>{id}</CARIID>
\t<CARIADI>{name}</CARIADI>
\t<SEHIR>{city}</SEHIR>
\t<ULKE>{country}</ULKE>
\t<Notlar>{notes}</Notlar>
\t<FISTAR>{date}</FISTAR>
\t<FISSAAT>{time}</FISSAAT>
\t<SEVKTAR>{date}</SEVKTAR>
\t<SEVKSAAT>{time}</SEVKSAAT>
\t<SevkPlakalari/>
\t<Satirlar>{rows}
\t</Satirlar>
</Fis>
",
        owner = escape(&header.owner_id),
        doc = escape(&header.document_no),
        id = escape(&header.facility_id),
        name = escape(&header.facility_display_name),
        city = escape(&header.city),
        country = escape(&header.country),
        notes = escape(&header.notes),
        date = escape(&header.document_date),
        time = escape(&header.document_time),
        rows = rows,
    )
}
