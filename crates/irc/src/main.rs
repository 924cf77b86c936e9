use anyhow::bail;
use clap::Parser;
use intco::{connect::connectivity_from_distances, hessian::guess};
use irc::{
    config::Direction,
    input::Input,
    predictor::{gradient_half_step, hessian_half_step},
};
use log::{info, warn};

/// take the predictor half of an IRC step from a transition state
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// input file
    #[arg(value_parser, default_value_t = String::from("irc.toml"))]
    infile: String,

    /// Print the pivot and guess points as JSON instead of a table. Defaults
    /// to false.
    #[arg(short, long, default_value_t = false)]
    json: bool,

    /// Step backward along the reaction path regardless of the direction in
    /// the input file. Defaults to false.
    #[arg(short, long, default_value_t = false)]
    backward: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let input = Input::load(&args.infile)?;
    let mut config = input.irc.clone();
    if args.backward {
        config.direction = Direction::Backward;
    }
    info!("{config}");

    let mut mol = input.molsys()?;
    let before = mol.geom();
    mol.split_by_connectivity(config.covalent_connect)?;
    if mol.geom() != before {
        if input.gradient.is_some() {
            bail!("splitting into fragments reordered the atoms");
        }
        warn!("splitting into fragments reordered the atoms");
    }
    let mut conn = connectivity_from_distances(
        &mol.geom(),
        &mol.z(),
        config.covalent_connect,
    )?;
    mol.augment_connectivity_to_single_fragment(&mut conn, &config)?;
    mol.consolidate()?;
    mol.add_intcos_from_connectivity(Some(&conn), &config)?;
    info!("molecular system:\n{mol}");

    let intcos = mol.intcos();
    let geom = mol.geom();
    let b = mol.b_matrix()?;
    let hq = match input.hessian(intcos.len())? {
        Some(h) => h,
        None => guess(&intcos, &geom, &mol.z(), &conn, config.hessian_guess)?,
    };

    let half = match input.gradient(mol.natom())? {
        Some(gx) => gradient_half_step(&mol, &gx, &b, &config)?,
        None => hessian_half_step(&mol, &hq, &b, &config)?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&half)?);
        return Ok(());
    }

    println!(
        "{:<6}{:<16}{:>14}{:>14}{:>14}",
        "No.", "Coordinate", "q0", "Pivot", "Guess"
    );
    for (i, ic) in intcos.iter().enumerate() {
        println!(
            "{:<6}{:<16}{:>14.8}{:>14.8}{:>14.8}",
            i + 1,
            ic.to_string(),
            half.q0[i],
            half.pivot[i],
            half.guess[i]
        );
    }
    println!();
    println!("|dq| to guess point = {:.8}", half.dq_norm);
    println!("normal termination of irc");

    Ok(())
}
