use std::io::Error;
use std::path::Path;

pub fn write_script(path: &Path, rows: &[[&str; 5]]) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["op", "user", "counterparty", "amount", "currency"])?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}
