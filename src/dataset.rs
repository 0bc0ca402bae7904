use anyhow::{bail, format_err, Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

/// One converged scenario: the swept load and the resulting bus voltages.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Active load at the swept bus (p.u.).
    pub p_load: f64,
    /// Reactive load at the swept bus (p.u.).
    pub q_load: f64,
    /// Voltage magnitude at every bus (p.u.).
    pub vm: Vec<f64>,
    /// Voltage angle at every bus (rad).
    pub va: Vec<f64>,
}

/// Rows accumulated over a load sweep, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Swept bus (0-based).
    pub bus: usize,
    /// Number of buses in the network.
    pub nb: usize,
    pub rows: Vec<DatasetRow>,
    /// Grid points that failed to solve.
    pub skipped: usize,
}

impl Dataset {
    pub fn new(bus: usize, nb: usize) -> Self {
        Self {
            bus,
            nb,
            rows: Vec::new(),
            skipped: 0,
        }
    }

    /// Column names: swept load, then bus magnitudes, then bus angles.
    pub fn columns(&self) -> Vec<String> {
        let k = self.bus + 1;
        let mut cols = vec![format!("P_load_bus{}", k), format!("Q_load_bus{}", k)];
        cols.extend((1..=self.nb).map(|i| format!("V_bus{}", i)));
        cols.extend((1..=self.nb).map(|i| format!("theta_bus{}", i)));
        cols
    }

    /// (rows, columns) of the table.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), 2 + 2 * self.nb)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv<W: Write>(&self, wtr: W) -> Result<()> {
        let mut wtr = WriterBuilder::new().from_writer(wtr);
        wtr.write_record(self.columns())?;
        for row in &self.rows {
            if row.vm.len() != self.nb || row.va.len() != self.nb {
                bail!(
                    "row has {} magnitudes and {} angles, expected {}",
                    row.vm.len(),
                    row.va.len(),
                    self.nb
                );
            }
            let load = [row.p_load, row.q_load];
            let record = load
                .iter()
                .chain(&row.vm)
                .chain(&row.va)
                .map(|x| x.to_string());
            wtr.write_record(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating dataset file {:?}", path))?;
        self.write_csv(file)
            .with_context(|| format!("writing dataset file {:?}", path))?;
        log::info!("wrote {} rows to {:?}", self.rows.len(), path);
        Ok(())
    }

    /// Reads a table written by `write_csv`. The skipped count is not
    /// stored in the table and reads back as zero.
    pub fn read_csv<R: Read>(rdr: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().from_reader(rdr);
        let headers = rdr.headers()?.clone();
        let (bus, nb) = parse_headers(&headers)?;

        let mut ds = Dataset::new(bus, nb);
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let values = record
                .iter()
                .map(|s| s.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .with_context(|| format!("parsing data row {}", line + 1))?;
            if values.len() != 2 + 2 * nb {
                bail!("data row {} has {} fields", line + 1, values.len());
            }
            ds.rows.push(DatasetRow {
                p_load: values[0],
                q_load: values[1],
                vm: values[2..2 + nb].to_vec(),
                va: values[2 + nb..].to_vec(),
            });
        }
        Ok(ds)
    }

    pub fn from_csv_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening dataset file {:?}", path))?;
        Self::read_csv(file).with_context(|| format!("reading dataset file {:?}", path))
    }
}

fn parse_headers(headers: &StringRecord) -> Result<(usize, usize)> {
    let n_fields = headers.len();
    if n_fields < 4 || n_fields % 2 != 0 {
        bail!("unexpected number of columns: {}", n_fields);
    }
    let first = headers.get(0).unwrap_or_default();
    let k: usize = first
        .strip_prefix("P_load_bus")
        .and_then(|k| k.parse().ok())
        .filter(|&k| k >= 1)
        .ok_or_else(|| format_err!("unexpected first column {:?}", first))?;

    let ds = Dataset::new(k - 1, (n_fields - 2) / 2);
    let expected = ds.columns();
    if let Some((got, want)) = headers.iter().zip(&expected).find(|(g, w)| *g != w.as_str()) {
        bail!("unexpected column {:?}, expected {:?}", got, want);
    }
    Ok((ds.bus, ds.nb))
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns().join("  "))?;
        for row in &self.rows {
            let line = [row.p_load, row.q_load]
                .iter()
                .chain(&row.vm)
                .chain(&row.va)
                .map(|x| format!("{:.6}", x))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let mut ds = Dataset::new(1, 3);
        ds.rows.push(DatasetRow {
            p_load: 0.5,
            q_load: 0.7142857142857143,
            vm: vec![1.0, 0.97, 0.98],
            va: vec![0.0, -0.02, -0.03],
        });
        ds
    }

    #[test]
    fn column_names() {
        assert_eq!(
            sample().columns(),
            vec![
                "P_load_bus2",
                "Q_load_bus2",
                "V_bus1",
                "V_bus2",
                "V_bus3",
                "theta_bus1",
                "theta_bus2",
                "theta_bus3",
            ]
        );
        assert_eq!(sample().shape(), (1, 8));
    }

    #[test]
    fn csv_text() {
        let mut buf = Vec::new();
        sample().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("P_load_bus2,Q_load_bus2,V_bus1,V_bus2,V_bus3,theta_bus1,theta_bus2,theta_bus3")
        );
        assert_eq!(
            lines.next(),
            Some("0.5,0.7142857142857143,1,0.97,0.98,0,-0.02,-0.03")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn read_back() {
        let mut buf = Vec::new();
        sample().write_csv(&mut buf).unwrap();
        assert_eq!(Dataset::read_csv(buf.as_slice()).unwrap(), sample());
    }

    #[test]
    fn rejects_foreign_table() {
        let text = "V_terminal_pu,E_internal_pu,delta_deg,P_pu\n1,1.2,0,0\n";
        assert!(Dataset::read_csv(text.as_bytes()).is_err());

        let text = "P_load_bus2,Q_load_bus2,V_bus1,theta_bus2\n1,1,1,0\n";
        assert!(Dataset::read_csv(text.as_bytes()).is_err());
    }

    #[test]
    fn rejects_ragged_row() {
        let mut ds = sample();
        ds.rows[0].va.pop();
        assert!(ds.write_csv(Vec::new()).is_err());
    }
}
