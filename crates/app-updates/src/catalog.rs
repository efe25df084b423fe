use crate::source::{MatchPick, VendorSource};
use crate::version::AppVersion;

pub const DEFAULT_VERSION_KEY: &str = "CFBundleShortVersionString";

/// How an application spells its version numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionScheme {
    #[default]
    Dotted,
    /// A bare build number such as `Build 4143`, read as `4.143.0`: the
    /// leading digit is the major version, the rest the minor.
    BuildNumber,
}

impl VersionScheme {
    /// Version of the installed bundle from its raw `Info.plist` string.
    pub fn installed(self, raw: &str) -> AppVersion {
        match self {
            Self::Dotted => AppVersion::normalize(raw),
            Self::BuildNumber => raw
                .split(|c: char| !c.is_ascii_digit())
                .find(|run| !run.is_empty())
                .and_then(|build| build.parse::<u64>().ok())
                .map_or_else(AppVersion::sentinel, build_to_version),
        }
    }

    /// Rescales a version parsed from a vendor page.
    pub fn published(self, version: AppVersion) -> AppVersion {
        match self {
            Self::Dotted => version,
            Self::BuildNumber if version.is_sentinel() => version,
            Self::BuildNumber => build_to_version(version.major),
        }
    }
}

fn build_to_version(build: u64) -> AppVersion {
    if build < 10 {
        return AppVersion::new(build, 0, 0);
    }
    let digits = build.to_string();
    let (major, minor) = digits.split_at(1);
    AppVersion::new(
        major.parse().unwrap_or_default(),
        minor.parse().unwrap_or_default(),
        0,
    )
}

/// Static description of one tracked application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDefinition {
    pub id: String,
    /// Bundle directory name without `.app`.
    pub app_name: String,
    pub marketing_name: String,
    pub bundle_id: String,
    pub source: VendorSource,
    /// Info.plist key holding the installed version.
    pub version_key: String,
    pub supports_recently_used: bool,
    pub scheme: VersionScheme,
}

impl AppDefinition {
    pub fn new(
        id: &str,
        app_name: &str,
        marketing_name: &str,
        bundle_id: &str,
        source: VendorSource,
    ) -> Self {
        Self {
            id: id.to_string(),
            app_name: app_name.to_string(),
            marketing_name: marketing_name.to_string(),
            bundle_id: bundle_id.to_string(),
            source,
            version_key: DEFAULT_VERSION_KEY.to_string(),
            supports_recently_used: true,
            scheme: VersionScheme::Dotted,
        }
    }

    pub fn with_scheme(mut self, scheme: VersionScheme) -> Self {
        self.scheme = scheme;
        self
    }
}

fn pattern(url: &str, pattern: &str, pick: MatchPick) -> VendorSource {
    VendorSource::Pattern {
        url: url.to_string(),
        pattern: pattern.to_string(),
        pick,
    }
}

pub fn default_catalog() -> Vec<AppDefinition> {
    vec![
        AppDefinition::new(
            "541f82b2-db88-588f-9389-a41b81973b45",
            "1Password 7",
            "1Password 7",
            "com.agilebits.onepassword7",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "0a076668-f8c6-4d53-b275-6806afcddca8",
            "1Password",
            "1Password",
            "com.1password.1password",
            pattern(
                "https://releases.1password.com/mac/8.9/",
                r"([\d.]+)</h6>",
                MatchPick::Last,
            ),
        ),
        AppDefinition::new(
            "5c6cdb30-2e84-55b0-9d8e-754067b5094e",
            "Adobe Acrobat Reader DC",
            "Adobe Reader",
            "com.adobe.Reader",
            pattern(
                "https://helpx.adobe.com/acrobat/release-note/release-notes-acrobat-reader.html",
                r"<a [^>]*ReleaseNotesDC[^>]*>[^<]*\(([^)]+)\)</a>",
                MatchPick::First,
            ),
        ),
        AppDefinition::new(
            "42e4fce2-b34f-5220-990a-33ba64e9ffa0",
            "Bitwarden",
            "Bitwarden",
            "com.bitwarden.desktop",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "765b6f80-7a20-5d60-a8c4-013ea360c28e",
            "Cyberduck",
            "Cyberduck",
            "ch.sudo.cyberduck",
            VendorSource::Sparkle {
                url: "https://version.cyberduck.io/changelog.rss".to_string(),
            },
        ),
        AppDefinition::new(
            "4cb5ec2d-b3c5-5f72-bed1-aae0c26201b9",
            "Dashlane",
            "Dashlane",
            "com.dashlane.dashlanephonefinal",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "ee11fe36-a372-5cba-a1b4-151748fc2fa7",
            "Docker",
            "Docker",
            "com.docker.docker",
            pattern(
                "https://raw.githubusercontent.com/docker/docker.github.io/master/desktop/mac/release-notes/index.md",
                r"## Docker Desktop ([\d.]+)",
                MatchPick::First,
            ),
        ),
        AppDefinition::new(
            "ca6c8ed7-6d22-5342-908a-f010e3eb102f",
            "Enpass",
            "Enpass",
            "in.sinew.Enpass-Desktop",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "768a574c-75a2-536d-8785-ef9512981184",
            "Firefox",
            "Firefox",
            "org.mozilla.firefox",
            VendorSource::JsonMaxKey {
                url: "https://product-details.mozilla.org/1.0/firefox_history_stability_releases.json"
                    .to_string(),
            },
        ),
        AppDefinition::new(
            "d34ee340-67a7-5e3e-be8b-aef4e3133de0",
            "Google Chrome",
            "Google Chrome",
            "com.google.Chrome",
            VendorSource::JsonPointer {
                url: "https://versionhistory.googleapis.com/v1/chrome/platforms/mac/channels/stable/versions"
                    .to_string(),
                pointer: "/versions/0/version".to_string(),
            },
        ),
        AppDefinition::new(
            "be6e677f-231a-431c-9c80-861c867b8920",
            "Grammarly Desktop",
            "Grammarly",
            "com.grammarly.ProjectLlama",
            VendorSource::Sparkle {
                url: "https://download-mac.grammarly.com/appcast.xml".to_string(),
            },
        ),
        AppDefinition::new(
            "1a925bda-7c49-52de-a970-a84b53ea2d7b",
            "iTerm",
            "iTerm",
            "com.googlecode.iterm2",
            VendorSource::Sparkle {
                url: "https://iterm2.com/appcasts/final_modern.xml".to_string(),
            },
        ),
        AppDefinition::new(
            "5726931a-264a-5758-b7dd-d09285ac4b7f",
            "LibreOffice",
            "LibreOffice",
            "org.libreoffice.script",
            pattern(
                "https://www.libreoffice.org/download/download/",
                r#"<span class="dl_version_number">([\d.]+)</span>"#,
                MatchPick::First,
            ),
        ),
        AppDefinition::new(
            "1b282abb-888b-4f82-bba4-db8ce46a8e2a",
            "LuLu",
            "LuLu",
            "com.objective-see.lulu.app",
            pattern(
                "https://objective-see.com/products/changelogs/LuLu.txt",
                r"VERSION ([\d.]+) ",
                MatchPick::First,
            ),
        ),
        AppDefinition::new(
            "a0fb7240-191e-4d27-84bd-175f2b61bec1",
            "Microsoft Teams",
            "Microsoft Teams",
            "com.microsoft.teams",
            VendorSource::JsonPointer {
                url: "https://config.teams.microsoft.com/config/v1/MicrosoftTeams/1415_1.0.0.0?environment=prod&audienceGroup=general&teamsRing=general&agent=TeamsBuilds"
                    .to_string(),
                pointer: "/buildSettings/webView2/macOS/latestVersion".to_string(),
            },
        ),
        AppDefinition::new(
            "567eb82b-a407-5998-a620-ca8165d74852",
            "NordLayer",
            "NordLayer",
            "com.nordvpn.macos.teams",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "b621849f-c1ed-5483-ba71-a90968b1fa7b",
            "Signal",
            "Signal",
            "org.whispersystems.signal-desktop",
            pattern(
                "https://updates.signal.org/desktop/latest-mac.yml",
                r"version: ?([\d.]+)",
                MatchPick::First,
            ),
        ),
        AppDefinition::new(
            "9894a05b-964d-5c19-bef7-53112207d271",
            "Slack",
            "Slack",
            "com.tinyspeck.slackmacgap",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "0ae675c9-1fbe-5fcc-8e4a-c0f53f4d8b4d",
            "Sublime Text",
            "Sublime Text",
            "com.sublimetext.4",
            pattern(
                "https://www.sublimetext.com/download",
                r"Build (\d+)",
                MatchPick::First,
            ),
        )
        .with_scheme(VersionScheme::BuildNumber),
        AppDefinition::new(
            "3f70f103-2cd1-50f0-a053-5eb91c891ec8",
            "Tailscale",
            "Tailscale",
            "io.tailscale.ipn.macos",
            VendorSource::AppStore,
        ),
        AppDefinition::new(
            "febd20fb-3dec-5834-a0ba-58f3342df58c",
            "Visual Studio Code",
            "Visual Studio Code",
            "com.microsoft.VSCode",
            pattern(
                "https://code.visualstudio.com/updates/",
                r"<strong>Update ([\d.]+)</strong>",
                MatchPick::Highest,
            ),
        ),
        AppDefinition::new(
            "b0e0e64a-2d8c-50d1-947c-b037773827c9",
            "WireGuard",
            "WireGuard",
            "com.wireguard.macos",
            VendorSource::AppStore,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_ids_and_bundles_are_unique() {
        let apps = default_catalog();
        let ids: HashSet<_> = apps.iter().map(|a| a.id.as_str()).collect();
        let bundles: HashSet<_> = apps.iter().map(|a| a.bundle_id.as_str()).collect();
        assert_eq!(ids.len(), apps.len());
        assert_eq!(bundles.len(), apps.len());
    }

    #[test]
    fn catalog_patterns_compile() {
        for app in default_catalog() {
            if let VendorSource::Pattern { pattern, .. } = &app.source {
                assert!(regex::Regex::new(pattern).is_ok(), "{}", app.app_name);
            }
        }
    }

    #[test]
    fn build_number_scheme_reads_installed_and_published_builds() {
        let scheme = VersionScheme::BuildNumber;
        assert_eq!(scheme.installed("Build 4143"), AppVersion::new(4, 143, 0));
        assert_eq!(scheme.installed("3211"), AppVersion::new(3, 211, 0));
        assert!(scheme.installed("Build").is_sentinel());
        assert_eq!(
            scheme.published(AppVersion::new(4169, 0, 0)),
            AppVersion::new(4, 169, 0)
        );
        assert!(scheme.published(AppVersion::sentinel()).is_sentinel());
        assert_eq!(
            VersionScheme::Dotted.installed("7.9.11"),
            AppVersion::new(7, 9, 11)
        );
    }
}
