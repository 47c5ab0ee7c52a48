use std::env;
use std::io::Write;
use std::sync::Arc;

use anyhow::Error;
use clap::{Arg, Command};
use env_logger::{Builder, Target};
use log::{error, info, Level, LevelFilter};

use propcalc::{Clause, Domain, Formula};

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn main_with_err() -> Result<i32, Error> {
    let matches = Command::new("propcalc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Propositional calculus playground")
        .arg(
            Arg::new("FORMULA")
                .help("The formula to analyze, in infix syntax")
                .required(true),
        )
        .get_matches();

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(|buf, record| {
            if record.level() == Level::Info {
                writeln!(buf, "c {}", record.args())
            } else {
                writeln!(buf, "c {}: {}", record.level(), record.args())
            }
        })
        .filter(None, LevelFilter::Info);
    if let Ok(ref env_var) = env::var("PROPCALC_LOG") {
        builder.parse_filters(env_var);
    }
    builder.init();

    info!("This is propcalc {}", env!("CARGO_PKG_VERSION"));

    let input = matches
        .get_one::<String>("FORMULA")
        .expect("FORMULA is a required argument");

    let domain = Arc::new(Domain::new());
    let formula = Formula::parse(input, &domain)?;

    println!("infix:   {}", formula.to_infix());
    println!("prefix:  {}", formula.to_prefix());
    println!("postfix: {}", formula.to_postfix());

    println!();
    println!("truth table:");
    let vars = formula.vars();
    for (assign, value) in formula.truthtable() {
        let row: Vec<String> = vars
            .iter()
            .map(|&var| {
                format!(
                    "{}{}",
                    if assign[var] { "" } else { "~" },
                    domain.name(var)
                )
            })
            .collect();
        println!("  {} | {}", row.join(" "), if value { 1 } else { 0 });
    }

    println!();
    println!("cnf:");
    let cnf: Vec<Clause> = formula.cnf().collect();
    for clause in &cnf {
        println!("  {}", render_clause(clause, &domain));
    }

    println!();
    println!("tseitin transform:");
    let mut tseitin = formula.tseitin();
    let clauses: Vec<Clause> = tseitin.by_ref().collect();
    let aux = tseitin.aux_domain();
    for clause in &clauses {
        println!("  {:?}", clause);
    }
    for var in aux.list() {
        println!("  {} = {}", var, aux.name(var));
    }

    println!();
    println!("dimacs round-trip of the cnf:");
    let mut document = Vec::new();
    propcalc_dimacs::write(
        &mut document,
        cnf.into_iter(),
        &[&format!("cnf of {}", formula)],
    )?;
    print!("{}", String::from_utf8(document.clone())?);

    let read_back = propcalc_dimacs::read_formula(&document[..], &Arc::new(Domain::new()))?;
    println!("reads back as: {}", read_back);

    Ok(0)
}

fn render_clause(clause: &Clause, domain: &Domain) -> String {
    let mut out = String::from("{ ");
    for (var, sign) in clause.iter() {
        if !sign {
            out.push('-');
        }
        out.push_str(&domain.name(var));
        out.push(' ');
    }
    out.push('}');
    out
}
