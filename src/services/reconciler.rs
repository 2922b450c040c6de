use crate::domain::{ConfigOverrides, ImageConfig, MutateArg};

/// Entrypoint and command after inheritance from the base image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub entrypoint: Option<String>,
    pub cmd: Option<String>,
}

/// Resolves the effective metadata for `mutate`.
///
/// `crane mutate` drops `Cmd` when only `--entrypoint` is given
/// (go-containerregistry#2041), so both values are always re-sent,
/// falling back to whatever the base image carries.
pub struct ConfigReconciler;

impl ConfigReconciler {
    pub fn resolve(overrides: &ConfigOverrides, base: &ImageConfig) -> ResolvedConfig {
        ResolvedConfig {
            entrypoint: overrides
                .entrypoint()
                .map(str::to_string)
                .or_else(|| base.joined_entrypoint()),
            cmd: overrides
                .cmd()
                .map(str::to_string)
                .or_else(|| base.joined_cmd()),
        }
    }

    /// Env entries in caller order, then entrypoint, cmd, user, workdir
    pub fn mutate_args(overrides: &ConfigOverrides, resolved: &ResolvedConfig) -> Vec<MutateArg> {
        let mut args: Vec<MutateArg> = overrides.env.iter().cloned().map(MutateArg::Env).collect();

        if let Some(entrypoint) = &resolved.entrypoint {
            args.push(MutateArg::Entrypoint(entrypoint.clone()));
        }
        if let Some(cmd) = &resolved.cmd {
            args.push(MutateArg::Cmd(cmd.clone()));
        }
        if let Some(user) = &overrides.user {
            args.push(MutateArg::User(user.clone()));
        }
        if let Some(workdir) = &overrides.workdir {
            args.push(MutateArg::Workdir(workdir.clone()));
        }

        args
    }
}
