#![allow(dead_code)]

use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const HEADER: [&str; 8] = [
    "type", "user", "target", "amount", "reference", "asset", "quantity", "price",
];

/// Writes a command file that opens wallet 1 and deposits 1.0 `rows` times.
pub fn generate_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    wtr.write_record(HEADER)?;
    wtr.write_record(["open", "1"])?;

    for i in 1..=rows {
        wtr.write_record(["deposit", "1", "", "1.0", &format!("pay_{i}")])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes roughly `size_mb` megabytes of deposits and transfers spread over
/// 50 wallets.
pub fn generate_large_csv(path: &Path, size_mb: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);
    wtr.write_record(HEADER)?;
    for user in 1..=50 {
        wtr.write_record(["open", &user.to_string()])?;
    }

    let target_size = (size_mb * 1024 * 1024) as u64;
    let mut seq: u64 = 1;

    // Check size every 5000 rows to avoid syscall overhead
    loop {
        for _ in 0..5000 {
            let user = (seq % 50 + 1).to_string();
            if seq % 4 == 0 {
                let target = ((seq + 7) % 50 + 1).to_string();
                wtr.write_record(["transfer", &user, &target, "0.5"])?;
            } else {
                wtr.write_record(["deposit", &user, "", "1.0", &format!("pay_{seq}")])?;
            }
            seq += 1;
        }
        wtr.flush()?; // Flush to ensure file size is updated
        if std::fs::metadata(path)?.len() >= target_size {
            break;
        }
    }
    Ok(())
}
