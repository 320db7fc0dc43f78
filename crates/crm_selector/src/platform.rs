use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! str_enum {
    ($name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                $(if lower == $value { return Ok($name::$variant); })+
                Err(())
            }
        }
    };
}

str_enum!(OperatingSystem {
    Linux => "linux",
    Osx => "osx",
    Unix => "unix",
    Windows => "win",
});

str_enum!(Arch {
    Sys390 => "s390x",
    X86 => "x86",
    X8664 => "x86_64",
    Aarch64 => "aarch64",
    Arm64 => "arm64",
    ArmV6l => "armv6l",
    ArmV7l => "armv7l",
    Ppc64le => "ppc64le",
});

str_enum!(PlatformAlias {
    Linux32 => "linux32",
    Linux64 => "linux64",
    Win32 => "win32",
    Win64 => "win64",
});

str_enum!(Platform {
    Linux32 => "linux-32",
    Linux64 => "linux-64",
    LinuxAarch64 => "linux-aarch64",
    LinuxArmV6l => "linux-armv6l",
    LinuxArmV7l => "linux-armv7l",
    LinuxPpc64le => "linux-ppc64le",
    LinuxSys390 => "linux-s390x",
    Osx64 => "osx-64",
    OsxArm64 => "osx-arm64",
    Win32 => "win-32",
    Win64 => "win-64",
    WinArm64 => "win-arm64",
});

pub const NO_ARCH: &str = "noarch";

pub fn platforms_by_arch(arch: Arch) -> HashSet<Platform> {
    use Platform::*;
    let x86_64_set = HashSet::from([Linux64, Osx64, Win64]);
    match arch {
        Arch::Sys390 => HashSet::from([LinuxSys390]),
        Arch::X86 => {
            let mut set = HashSet::from([Linux32, Win32]);
            set.extend(x86_64_set);
            set
        }
        Arch::X8664 => x86_64_set,
        Arch::Aarch64 => HashSet::from([LinuxAarch64]),
        Arch::Arm64 => HashSet::from([OsxArm64, WinArm64]),
        Arch::ArmV6l => HashSet::from([LinuxArmV6l]),
        Arch::ArmV7l => HashSet::from([LinuxArmV7l]),
        Arch::Ppc64le => HashSet::from([LinuxPpc64le]),
    }
}

pub fn platforms_by_os(os: OperatingSystem) -> HashSet<Platform> {
    use Platform::*;
    let osx_set = HashSet::from([Osx64, OsxArm64]);
    let linux_set = HashSet::from([
        Linux32,
        Linux64,
        LinuxAarch64,
        LinuxArmV6l,
        LinuxArmV7l,
        LinuxPpc64le,
        LinuxSys390,
    ]);
    match os {
        OperatingSystem::Linux => linux_set,
        OperatingSystem::Osx => osx_set,
        OperatingSystem::Unix => osx_set.union(&linux_set).copied().collect(),
        OperatingSystem::Windows => HashSet::from([Win32, Win64, WinArm64]),
    }
}

pub fn platforms_by_alias(alias: PlatformAlias) -> HashSet<Platform> {
    use Platform::*;
    match alias {
        PlatformAlias::Linux32 => HashSet::from([Linux32]),
        PlatformAlias::Linux64 => HashSet::from([Linux64]),
        PlatformAlias::Win32 => HashSet::from([Win32]),
        PlatformAlias::Win64 => HashSet::from([Win64]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_covers_three_operating_systems() {
        let platforms = platforms_by_arch(Arch::X8664);
        assert!(platforms.contains(&Platform::Linux64));
        assert!(platforms.contains(&Platform::Osx64));
        assert!(platforms.contains(&Platform::Win64));
    }

    #[test]
    fn unix_is_the_union_of_linux_and_osx() {
        let unix = platforms_by_os(OperatingSystem::Unix);
        let linux = platforms_by_os(OperatingSystem::Linux);
        let osx = platforms_by_os(OperatingSystem::Osx);
        assert_eq!(unix.len(), linux.len() + osx.len());
    }

    #[test]
    fn platform_from_str_roundtrips() {
        assert_eq!(Platform::from_str("linux-64"), Ok(Platform::Linux64));
    }
}
