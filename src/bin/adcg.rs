// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the adcodegen project (compiled derivative kernels).

//! adcg: inspect and evaluate compiled adcodegen models.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ndarray::Array2;
use serde_json::{json, Value};

use adcodegen::{library_generic_path, CompiledModel};

#[derive(Parser, Debug)]
#[command(author, version, about = "Evaluate models compiled by adcodegen")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the model's dimensions and derivative order.
    Info(ModelArgs),
    /// Evaluate the model at a point.
    Eval(PointArgs),
    /// Evaluate the Jacobian at a point.
    Jacobian(PointArgs),
    /// Evaluate the Hessian of one output at a point.
    Hessian {
        #[command(flatten)]
        point: PointArgs,
        /// Output component whose Hessian is returned.
        #[arg(long, value_name = "K", default_value_t = 0)]
        output_dim: usize,
    },
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// Model name used at compile time.
    #[arg(long)]
    name: String,
    /// Directory holding the compiled artifact.
    #[arg(long, value_name = "DIR")]
    dir: PathBuf,
    /// Load interpreted kernels (lib<NAME>.kernels.json) instead of a shared library.
    #[arg(long)]
    interpreted: bool,
}

#[derive(Args, Debug)]
struct PointArgs {
    #[command(flatten)]
    model: ModelArgs,
    /// Comma-separated input values.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    input: Vec<f64>,
    /// Comma-separated parameter values.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    params: Vec<f64>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli.command) {
        Ok(value) => println!("{value:#}"),
        Err(err) => {
            eprintln!("error[adcg]: {err:#}");
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn run(command: &Command) -> Result<Value> {
    match command {
        Command::Info(args) => {
            let model = load(args)?;
            Ok(json!({
                "name": args.name,
                "input_size": model.input_size(),
                "output_size": model.output_size(),
                "order": model.order(),
            }))
        }
        Command::Eval(point) => {
            let model = load(&point.model)?;
            let y = if point.params.is_empty() {
                model.evaluate(&point.input[..])?
            } else {
                model.evaluate_with_params(&point.input[..], &point.params[..])?
            };
            Ok(json!({ "output": y.to_vec() }))
        }
        Command::Jacobian(point) => {
            let model = load(&point.model)?;
            let jac = if point.params.is_empty() {
                model.jacobian(&point.input[..])?
            } else {
                model.jacobian_with_params(&point.input[..], &point.params[..])?
            };
            Ok(json!({ "jacobian": rows(&jac) }))
        }
        Command::Hessian { point, output_dim } => {
            let model = load(&point.model)?;
            let hess = if point.params.is_empty() {
                model.hessian(&point.input[..], *output_dim)?
            } else {
                model.hessian_with_params(&point.input[..], &point.params[..], *output_dim)?
            };
            Ok(json!({ "output_dim": output_dim, "hessian": rows(&hess) }))
        }
    }
}

fn load(args: &ModelArgs) -> Result<CompiledModel> {
    let generic_path = library_generic_path(&args.name, &args.dir);
    let loaded = if args.interpreted {
        CompiledModel::open_interpreted(&args.name, &generic_path)
    } else {
        CompiledModel::new(&args.name, &generic_path)
    };
    loaded.with_context(|| {
        format!(
            "failed to load model '{}' from {}",
            args.name,
            args.dir.display()
        )
    })
}

fn rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}
