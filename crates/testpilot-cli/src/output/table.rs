use anyhow::Result;
use comfy_table::Table;
use testpilot_core::storage::Page;

pub fn print_table(table: Table) -> Result<()> {
    println!("{table}");
    Ok(())
}

/// Table followed by a `page x/y (n total)` footer.
pub fn print_page<T>(table: Table, page: &Page<T>) -> Result<()> {
    print_table(table)?;
    println!(
        "page {}/{} ({} total)",
        page.page,
        page.total_pages.max(1),
        page.total
    );
    Ok(())
}
