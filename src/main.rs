use csv_core::{ReadFieldResult, ReaderBuilder};
use poot::*;
use std::env;
use std::io;
use std::str;

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn engine(err: Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

/// Reads a tab-separated tableau from the input. The header row names the
/// fixed columns `input`, `output`, `optimal` and then one column per
/// constraint; each following row is one candidate, with blank violation
/// cells reading as zero.
fn load_tableau<I: io::Read>(mut input: I, name: &str) -> io::Result<Dataset> {
    let mut inputbuf = [0; 16384];
    let mut fieldbuf = [0; 1024];
    let mut fieldlen = 0;
    let mut record: Vec<String> = Vec::new();
    let mut dataset: Option<Dataset> = None;
    let mut tsv = ReaderBuilder::new().delimiter(b'\t').build();

    loop {
        let read = input.read(&mut inputbuf)?;
        let mut bytes = &inputbuf[..read];
        loop {
            let (result, nin, nout) = tsv.read_field(bytes, &mut fieldbuf[fieldlen..]);
            bytes = &bytes[nin..];
            fieldlen += nout;
            match result {
                ReadFieldResult::InputEmpty => break,
                ReadFieldResult::OutputFull => {
                    return Err(invalid(format!("field too long on line {}", tsv.line())));
                }
                ReadFieldResult::Field { record_end } => {
                    let field = str::from_utf8(&fieldbuf[..fieldlen])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    fieldlen = 0;
                    record.push(field.to_string());

                    if record_end {
                        let line = tsv.line();
                        match dataset {
                            None => dataset = Some(header_row(&record, name)?),
                            Some(ref mut dset) => candidate_row(dset, &record, line)?,
                        }
                        record.clear();
                    }
                }
                ReadFieldResult::End => {
                    return dataset
                        .ok_or_else(|| invalid("empty tableau: no header row".to_string()));
                }
            }
        }
    }
}

fn header_row(record: &[String], name: &str) -> io::Result<Dataset> {
    let fixed = ["input", "output", "optimal"];
    if record.len() < 4 || !record.iter().zip(&fixed).all(|(f, w)| f.eq_ignore_ascii_case(w)) {
        return Err(invalid(
            "header row must read: input, output, optimal, then one constraint per column"
                .to_string(),
        ));
    }
    let constraints: Vec<&str> = record[3..].iter().map(|s| s.as_str()).collect();
    Dataset::new(name, &constraints).map_err(engine)
}

fn candidate_row(dataset: &mut Dataset, record: &[String], line: u64) -> io::Result<()> {
    let expected = 3 + usize::from(dataset.num_constraints());
    if record.len() != expected {
        return Err(invalid(format!(
            "line {}: expected {} fields, found {}",
            line,
            expected,
            record.len()
        )));
    }
    let optimal = match record[2].to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "" | "0" | "false" | "no" => false,
        other => {
            return Err(invalid(format!(
                "line {}: cannot read optimality flag \"{}\"",
                line, other
            )))
        }
    };
    let mut violations = Vec::with_capacity(expected - 3);
    for cell in &record[3..] {
        if cell.is_empty() {
            violations.push(0);
        } else {
            violations.push(cell.parse().map_err(|_| {
                invalid(format!("line {}: bad violation count \"{}\"", line, cell))
            })?);
        }
    }
    dataset
        .add_candidate(&record[0], &record[1], optimal, &violations)
        .map_err(engine)?;
    Ok(())
}

struct Options {
    name: String,
    kind: OrderKind,
    sort_by: SortBy,
    apriori_pairs: Vec<(String, String)>,
}

fn parse_args() -> io::Result<Options> {
    let mut options = Options {
        name: "tableau".to_string(),
        kind: OrderKind::Partial,
        sort_by: SortBy::RankVolume,
        apriori_pairs: Vec::new(),
    };
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--classical" => options.kind = OrderKind::Total,
            "--sort-by" => {
                let value = args
                    .next()
                    .ok_or_else(|| invalid("--sort-by needs a value".to_string()))?;
                options.sort_by = match value.as_str() {
                    "size" => SortBy::Size,
                    "rank-volume" => SortBy::RankVolume,
                    other => return Err(invalid(format!("unknown sort key \"{}\"", other))),
                };
            }
            "--apriori" => {
                let value = args
                    .next()
                    .ok_or_else(|| invalid("--apriori needs DOMINATOR>DOMINATED".to_string()))?;
                let (dominator, dominated) = value
                    .split_once('>')
                    .ok_or_else(|| invalid(format!("cannot read a priori pair \"{}\"", value)))?;
                options
                    .apriori_pairs
                    .push((dominator.to_string(), dominated.to_string()));
            }
            name if !name.starts_with('-') => options.name = name.to_string(),
            other => {
                return Err(invalid(format!(
                    "unknown option \"{}\"; usage: poot [NAME] [--classical] \
                     [--sort-by size|rank-volume] [--apriori DOM>SUB]... < tableau.tsv",
                    other
                )))
            }
        }
    }
    Ok(options)
}

fn main() -> io::Result<()> {
    let options = parse_args()?;
    let dataset = load_tableau(io::stdin().lock(), &options.name)?;
    eprintln!(
        "{}: {} constraints, {} candidates over {} inputs",
        dataset.name(),
        dataset.num_constraints(),
        dataset.num_candidates(),
        dataset.num_groups()
    );

    let apriori = if options.apriori_pairs.is_empty() {
        None
    } else {
        let pairs: Vec<(&str, &str)> = options
            .apriori_pairs
            .iter()
            .map(|(a, b)| (a.as_str(), b.as_str()))
            .collect();
        Some(dataset.apriori_from_pairs(&pairs).map_err(engine)?)
    };

    let mut cache = SpaceCache::new();
    let space = cache.space(dataset.num_constraints()).map_err(engine)?;
    let evaluator = RankingEvaluator::new(space, &dataset).map_err(engine)?;

    let mut compatible = evaluator
        .compatible_rankings(options.kind, apriori.as_ref())
        .map_err(engine)?;
    space.sort_rankings(&mut compatible, options.sort_by);

    let stats = evaluator.statistics(&compatible);
    println!(
        "order space: {} rankings, {} total orders",
        stats.num_total_poots, stats.num_total_cots
    );
    println!(
        "compatible: {} of {} rankings ({:.2}%)",
        stats.num_poots, stats.num_total_poots, stats.percent_poots
    );
    println!(
        "compatible total orders: {} of {} ({:.2}%)",
        stats.num_cots, stats.num_total_cots, stats.percent_cots
    );

    for (index, grammar) in compatible.iter().enumerate() {
        println!();
        println!("grammar {}: {}", index, dataset.ranking_to_string(grammar));
        println!(
            "  size: {}, rank volume: {}",
            grammar.size(),
            space.rank_volume(grammar)
        );
        for (input, rows) in evaluator.cot_stats_by_candidate(grammar).map_err(engine)? {
            for row in rows {
                println!(
                    "  {} -> {}: {} refinements ({:.2}%)",
                    input, row.output, row.num_cot, row.per_cot
                );
            }
        }
    }

    let (global, delta) = evaluator
        .compute_entailments(apriori.as_ref())
        .map_err(engine)?;
    println!();
    println!("entailments:");
    for (outcome, entailed) in &global {
        println!("  {} => {}", outcome, entailed.join("; "));
    }
    if !delta.is_empty() {
        println!("entailments from the a priori ranking alone:");
        for (outcome, entailed) in &delta {
            println!("  {} => {}", outcome, entailed.join("; "));
        }
    }

    Ok(())
}
