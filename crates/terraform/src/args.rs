//! Command line construction for each Terraform subcommand

use crate::options::Options;

/// Arguments for `terraform init`
#[must_use]
pub fn init_args(options: &Options) -> Vec<String> {
    let mut args = vec![
        "init".to_string(),
        format!("-upgrade={}", options.upgrade),
        "-input=false".to_string(),
    ];
    args.extend(
        options
            .backend_config
            .iter()
            .map(|(key, value)| format!("-backend-config={key}={value}")),
    );
    if options.no_color {
        args.push("-no-color".to_string());
    }
    args
}

/// Arguments for `terraform apply`
#[must_use]
pub fn apply_args(options: &Options) -> Vec<String> {
    let mut args = vec![
        "apply".to_string(),
        "-input=false".to_string(),
        "-auto-approve".to_string(),
    ];
    push_plan_args(&mut args, options);
    args
}

/// Arguments for `terraform destroy`
#[must_use]
pub fn destroy_args(options: &Options) -> Vec<String> {
    let mut args = vec![
        "destroy".to_string(),
        "-auto-approve".to_string(),
        "-input=false".to_string(),
    ];
    push_plan_args(&mut args, options);
    args
}

/// Arguments for `terraform output`, which are always machine readable
#[must_use]
pub fn output_args() -> Vec<String> {
    vec![
        "output".to_string(),
        "-no-color".to_string(),
        "-json".to_string(),
    ]
}

fn push_plan_args(args: &mut Vec<String>, options: &Options) {
    for (name, value) in &options.vars {
        args.push("-var".to_string());
        args.push(format!("{name}={}", value.to_arg_value()));
    }
    for file in &options.var_files {
        args.push("-var-file".to_string());
        args.push(file.display().to_string());
    }
    if let Some(lock) = options.lock {
        args.push(format!("-lock={lock}"));
    }
    if let Some(parallelism) = options.parallelism {
        args.push(format!("-parallelism={parallelism}"));
    }
    if options.no_color {
        args.push("-no-color".to_string());
    }
}
