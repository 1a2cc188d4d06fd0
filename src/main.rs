use classedit::jvm::class_file::{ClassFile, Serialize};
use classedit::jvm::descriptors::{to_binary_name, ClassRenames};
use classedit::jvm::{self, Error};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::PathBuf;

fn main() -> Result<(), Error> {
    env_logger::init();

    let input = || {
        Arg::new("INPUT")
            .help("Class file to read")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .index(1)
    };
    let output = || {
        Arg::new("output")
            .long("output")
            .short('o')
            .value_name("FILE")
            .value_parser(value_parser!(PathBuf))
            .help("Where to write the result (defaults to overwriting the input)")
    };

    let matches = Command::new("Class file editor")
        .version(clap::crate_version!())
        .about("Inspect and edit JVM class files")
        .subcommand_required(true)
        .subcommand(
            Command::new("dump")
                .about("Print the structure of a class file")
                .arg(input()),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename classes everywhere they are mentioned")
                .arg(input())
                .arg(output())
                .arg(
                    Arg::new("rename")
                        .long("rename")
                        .short('r')
                        .value_name("OLD=NEW")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Class to rename (eg. `foo.Bar=baz.Qux`)"),
                ),
        )
        .subcommand(
            Command::new("compact")
                .about("Drop unused constants from the constant pool")
                .arg(input())
                .arg(output()),
        )
        .subcommand(
            Command::new("prune")
                .about("Keep only what is needed to compile against the class")
                .arg(input())
                .arg(output()),
        )
        .subcommand(
            Command::new("max-stack")
                .about("Recompute the maximum stack depth of every method")
                .arg(input()),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("dump", sub_matches)) => dump(&read_class(sub_matches)?),
        Some(("rename", sub_matches)) => {
            let mut renames = ClassRenames::new();
            for rename in sub_matches.get_many::<String>("rename").into_iter().flatten() {
                match rename.split_once('=') {
                    Some((old_name, new_name)) => {
                        renames.insert(to_binary_name(old_name), to_binary_name(new_name));
                    }
                    None => {
                        return Err(Error::UnsupportedConstruct(format!(
                            "rename {:?} is not of the form OLD=NEW",
                            rename
                        )))
                    }
                }
            }
            let mut class = read_class(sub_matches)?;
            class.rename_classes(&renames)?;
            write_class(sub_matches, &class)
        }
        Some(("compact", sub_matches)) => {
            let mut class = read_class(sub_matches)?;
            class.compact()?;
            write_class(sub_matches, &class)
        }
        Some(("prune", sub_matches)) => {
            let mut class = read_class(sub_matches)?;
            class.prune()?;
            write_class(sub_matches, &class)
        }
        Some(("max-stack", sub_matches)) => max_stack(&read_class(sub_matches)?),
        _ => unreachable!("a subcommand is required"),
    }
}

fn input_path(matches: &ArgMatches) -> &PathBuf {
    matches
        .get_one::<PathBuf>("INPUT")
        .expect("INPUT is a required argument")
}

fn read_class(matches: &ArgMatches) -> Result<ClassFile, Error> {
    let path = input_path(matches);
    log::info!("Reading '{}'", path.display());
    let bytes = fs::read(path)?;
    ClassFile::parse(&bytes)
}

fn write_class(matches: &ArgMatches, class: &ClassFile) -> Result<(), Error> {
    let path = matches
        .get_one::<PathBuf>("output")
        .unwrap_or_else(|| input_path(matches));
    log::info!("Writing '{}'", path.display());
    class.save_to_path(path, true)
}

fn dump(class: &ClassFile) -> Result<(), Error> {
    println!(
        "class {} (version {}.{})",
        class.name()?,
        class.version.major_version,
        class.version.minor_version
    );
    if let Some(super_name) = class.super_class_name()? {
        println!("  extends {}", super_name);
    }
    for interface in class.interface_names()? {
        println!("  implements {}", interface);
    }
    println!("  flags: {:?}", class.access_flags);
    println!(
        "  constant pool: {} slots, {} bytes encoded",
        class.constants.size(),
        class.to_bytes()?.len()
    );
    if let Some(source_file) = class.source_file()? {
        println!("  source file: {}", source_file);
    }
    for attribute in class.attributes.iter() {
        println!(
            "  attribute {} ({} bytes)",
            attribute.name(&class.constants)?,
            attribute.info.len()
        );
    }
    for field in &class.fields {
        println!(
            "  field {} {} {:?}",
            field.name(&class.constants)?,
            field.descriptor(&class.constants)?,
            field.access_flags
        );
    }
    for method in &class.methods {
        println!(
            "  method {}{} {:?}",
            method.name(&class.constants)?,
            method.descriptor(&class.constants)?,
            method.access_flags
        );
        if let Some(code) = method.code(&class.constants)? {
            println!(
                "    code: {} bytes, max_stack {}, max_locals {}, {} handlers",
                code.code_array.0.len(),
                code.max_stack,
                code.max_locals,
                code.exception_table.len()
            );
        }
    }
    println!("  references: {}", class.referenced_classes()?.join(", "));
    Ok(())
}

fn max_stack(class: &ClassFile) -> Result<(), Error> {
    for method in &class.methods {
        let name = method.name(&class.constants)?;
        let descriptor = method.descriptor(&class.constants)?;
        let code = match method.code(&class.constants)? {
            Some(code) => code,
            None => continue,
        };
        match code.compute_max_stack(&class.constants) {
            Ok(computed) => println!(
                "{}{}: declared {}, computed {}",
                name, descriptor, code.max_stack, computed
            ),
            Err(err @ jvm::Error::VerificationError { .. }) => {
                log::error!("Cannot analyze {}{}: {}", name, descriptor, err)
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

