use std::collections::HashMap;

use crate::types::{Action, Category};

/// One entry in the manipulation catalog. Lexical patterns are regex source
/// strings compiled case-insensitively by the lexical detector; an empty
/// pattern list means the type is only reachable through the structural or
/// semantic detectors (or exists as a secondary classification target).
#[derive(Debug, Clone)]
pub struct ManipulationType {
    pub type_id: &'static str,
    pub name: &'static str,
    pub category: Category,
    /// 1 (mild) to 5 (severe).
    pub severity: u8,
    pub action: Action,
    pub patterns: &'static [&'static str],
}

/// Static catalog of manipulation types. Built once at startup and shared by
/// reference; all detectors consult it, none mutate it.
pub struct Taxonomy {
    types: Vec<ManipulationType>,
    by_id: HashMap<&'static str, usize>,
}

impl Taxonomy {
    /// The built-in catalog: ~80 types across six categories.
    pub fn builtin() -> Self {
        let types = catalog();
        let by_id = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.type_id, i))
            .collect();
        Self { types, by_id }
    }

    pub fn get(&self, type_id: &str) -> Option<&ManipulationType> {
        self.by_id.get(type_id).map(|&i| &self.types[i])
    }

    pub fn types(&self) -> &[ManipulationType] {
        &self.types
    }

    /// Types carrying lexical patterns, for the regex detector.
    pub fn lexical_types(&self) -> impl Iterator<Item = &ManipulationType> {
        self.types.iter().filter(|t| !t.patterns.is_empty())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn t(
    type_id: &'static str,
    name: &'static str,
    category: Category,
    severity: u8,
    action: Action,
    patterns: &'static [&'static str],
) -> ManipulationType {
    ManipulationType {
        type_id,
        name,
        category,
        severity,
        action,
        patterns,
    }
}

#[rustfmt::skip]
fn catalog() -> Vec<ManipulationType> {
    use Action::*;
    use Category::*;

    vec![
        // A: sensationalism and emotional manipulation
        t("A.1.1", "Catastrophizing", Sensationalism, 4, Replace, &[
            r"\bcatastroph(e|ic|ically)\b", r"\bdisastrous\b", r"\bapocalyptic\b",
            r"\bnightmare scenario\b", r"\bcataclysmic?\b",
        ]),
        t("A.1.2", "Threat inflation", Sensationalism, 4, Replace, &[
            r"\bticking time bomb\b", r"\bexistential threat\b", r"\bon the brink\b",
            r"\bpowder keg\b", r"\blooming (crisis|disaster|threat)\b",
        ]),
        t("A.1.3", "Doom forecasting", Sensationalism, 3, Replace, &[
            r"\bspells? doom\b", r"\bdoomed\b", r"\bpoint of no return\b", r"\bdeath knell\b",
        ]),
        t("A.2.1", "Manufactured urgency", Sensationalism, 3, Remove, &[
            r"\bbreaking\s*:", r"\bjust in\s*:", r"\burgent\s*:", r"\bdeveloping\s*:",
            r"\bhappening now\b", r"\balert\s*:",
        ]),
        t("A.2.2", "Artificial scarcity", Sensationalism, 2, Replace, &[
            r"\blast chance\b", r"\btime is running out\b", r"\bbefore it'?s too late\b",
        ]),
        t("A.2.3", "Now-or-never framing", Sensationalism, 2, Replace, &[
            r"\bnow or never\b", r"\bonce[- ]in[- ]a[- ](lifetime|generation)\b", r"\bdo[- ]or[- ]die\b",
        ]),
        t("A.2.4", "Live-drama framing", Sensationalism, 2, Annotate, &[
            r"\bdramatic (scenes|moments)\b", r"\bin dramatic fashion\b",
        ]),
        t("A.3.1", "Outrage amplifiers", Sensationalism, 4, Replace, &[
            r"\boutrageous(ly)?\b", r"\bdisgraceful\b", r"\bshameful\b", r"\bscandalous\b",
            r"\bappalling\b",
        ]),
        t("A.3.2", "Shock descriptors", Sensationalism, 3, Replace, &[
            r"\bstunning\b", r"\bshocking\b", r"\bjaw[- ]dropping\b", r"\bbombshell\b",
            r"\beye[- ]popping\b",
        ]),
        t("A.3.3", "Emotional superlatives", Sensationalism, 3, Replace, &[
            r"\bdevastating\b", r"\bheartbreaking\b", r"\bhorrifying\b", r"\bterrifying\b",
            r"\bchilling\b",
        ]),
        t("A.4.1", "Dramatic escalation verbs", Sensationalism, 3, Replace, &[
            r"\berupt(s|ed)?\b", r"\bexplode(s|d) (in|into|over)\b", r"\bignite(s|d) (a|the)\b",
            r"\bspiral(s|ed|ing)? out of control\b",
        ]),
        t("A.4.2", "Crisis labeling", Sensationalism, 2, Annotate, &[
            r"\bcrisis of \w+\b", r"\b\w+ crisis\b",
        ]),
        t("A.4.3", "War metaphors", Sensationalism, 3, Replace, &[
            r"\bbattle lines?\b", r"\bwar on \w+\b", r"\bunder siege\b",
            r"\bfight for survival\b", r"\bopening salvo\b",
        ]),
        t("A.5.1", "Chaos nouns", Sensationalism, 3, Replace, &[
            r"\bchaos\b", r"\bmayhem\b", r"\bmeltdown\b", r"\bfrenzy\b", r"\bfirestorm\b",
        ]),
        t("A.5.2", "Debacle framing", Sensationalism, 3, Replace, &[
            r"\bdebacle\b", r"\bfiasco\b", r"\btrain ?wreck\b",
        ]),
        t("A.5.3", "Tearjerker cues", Sensationalism, 1, Annotate, &[
            r"\btragic(ally)?\b", r"\bgut[- ]wrenching\b",
        ]),

        // B: loaded language
        t("B.1.1", "Loaded adjectives", LoadedLanguage, 4, Replace, &[
            r"\bradical\b", r"\bextremist\b", r"\bfringe\b", r"\bnotorious\b",
            r"\binfamous\b", r"\bdisgraced\b",
        ]),
        t("B.1.2", "Delegitimizing qualifiers", LoadedLanguage, 3, Replace, &[
            r"\bso[- ]called\b", r"\bself[- ]styled\b", r"\bself[- ]proclaimed\b",
        ]),
        t("B.1.3", "Intensifier inflation", LoadedLanguage, 2, Replace, &[
            r"\bmassive\b", r"\bsweeping\b", r"\bunprecedented\b", r"\bstaggering\b",
            r"\bwhopping\b",
        ]),
        t("B.1.4", "Personal epithets", LoadedLanguage, 5, Remove, &[
            r"\bcrooked\b", r"\bderanged\b", r"\bunhinged\b",
        ]),
        t("B.1.5", "Smear adjectives", LoadedLanguage, 4, Replace, &[
            r"\bdisgruntled\b", r"\bembattled\b", r"\bscandal[- ](plagued|ridden)\b",
        ]),
        t("B.2.1", "Violence metaphors", LoadedLanguage, 4, Replace, &[
            r"\bdestroy(s|ed)\b", r"\bdemolish(es|ed)\b", r"\beviscerat(es|ed)\b",
            r"\bannihilat(es|ed)\b", r"\bobliterat(es|ed)\b", r"\bcrush(es|ed)\b",
        ]),
        t("B.2.2", "Rage verbs", LoadedLanguage, 4, Replace, &[
            r"\bslam(s|med)?\b", r"\bblast(s|ed)?\b", r"\brip(s|ped) into\b",
            r"\btorch(es|ed)\b", r"\bskewer(s|ed)\b", r"\blash(es|ed) out\b",
        ]),
        t("B.2.3", "Dismissal verbs", LoadedLanguage, 2, Replace, &[
            r"\bshrug(s|ged)? off\b", r"\bbrush(es|ed)? aside\b", r"\bwave(s|d)? away\b",
        ]),
        t("B.2.4", "Gushing verbs", LoadedLanguage, 2, Replace, &[
            r"\bgush(es|ed)? (about|over)\b", r"\brave(s|d) about\b", r"\bhail(s|ed) as\b",
        ]),
        t("B.3.1", "Euphemism", LoadedLanguage, 3, Annotate, &[
            r"\bcollateral damage\b", r"\benhanced interrogation\b", r"\bright[- ]?siz(e|ing)\b",
        ]),
        t("B.3.2", "Dysphemism", LoadedLanguage, 4, Replace, &[
            r"\bdeath tax\b", r"\bjob[- ]killing\b", r"\bnanny state\b", r"\bwitch ?hunt\b",
        ]),
        t("B.4.1", "Delegitimizing labels", LoadedLanguage, 4, Replace, &[
            r"\bregime\b", r"\bczar\b", r"\bcron(y|ies)\b", r"\bhenchmen\b",
        ]),
        t("B.4.2", "Belittling framings", LoadedLanguage, 2, Replace, &[
            r"\bso much for\b", r"\blittle more than\b", r"\bnothing more than\b",
        ]),
        t("B.5.1", "Reluctant-admission framing", LoadedLanguage, 2, Annotate, &[
            r"\beven \w+ admits?\b", r"\bfinally admit(s|ted)\b", r"\bwas forced to admit\b",
        ]),

        // C: framing and selection
        t("C.1.1", "False balance", Framing, 4, Annotate, &[]),
        t("C.1.2", "Cherry-picked contrast", Framing, 3, Annotate, &[]),
        t("C.1.3", "Misleading juxtaposition", Framing, 3, Annotate, &[]),
        t("C.2.1", "Hidden agency", Framing, 3, Rewrite, &[]),
        t("C.2.2", "Agent demotion", Framing, 2, Rewrite, &[]),
        t("C.2.3", "Nominalized accountability", Framing, 3, Rewrite, &[
            r"\bmistakes were made\b", r"\bshots were fired\b", r"\berrors occurred\b",
        ]),
        t("C.2.4", "Victim erasure", Framing, 3, Rewrite, &[]),
        t("C.3.1", "Rhetorical question", Framing, 2, Rewrite, &[]),
        t("C.3.2", "Presupposition", Framing, 3, Annotate, &[]),
        t("C.3.3", "Just-asking-questions", Framing, 3, Replace, &[
            r"\bjust asking questions\b", r"\bone has to wonder\b", r"\bmakes you wonder\b",
            r"\bsome (are )?wonder(ing)? whether\b",
        ]),
        t("C.4.1", "Scare quotes", Framing, 3, Annotate, &[]),
        t("C.5.1", "Elastic ranges", Framing, 2, Annotate, &[
            r"\bup to \d", r"\bas many as \d", r"\bas few as \d", r"\bcould be as high as\b",
        ]),
        t("C.5.2", "Denominator neglect", Framing, 3, Annotate, &[]),
        t("C.6.1", "Buried context", Framing, 3, Annotate, &[]),

        // D: sourcing and attribution
        t("D.1.1", "Anonymous authority", Attribution, 3, Annotate, &[
            r"\bexperts? (say|warn|agree|believe)\b", r"\bcritics (say|argue|charge)\b",
            r"\bsources? (say|told|claim)\b", r"\bofficials (say|admit)\b",
            r"\bobservers (say|note)\b", r"\banalysts (say|believe|warn)\b",
            r"\binsiders? (say|claim)\b",
        ]),
        t("D.1.2", "Vague quantifier attribution", Attribution, 3, Annotate, &[]),
        t("D.1.3", "Passive attribution", Attribution, 3, Rewrite, &[
            r"\bit is (believed|thought|understood|rumored)\b", r"\bis said to\b",
            r"\bis widely (seen|viewed|regarded)\b",
        ]),
        t("D.1.4", "Unnamed proximity sourcing", Attribution, 3, Annotate, &[
            r"\b(sources?|people|those) familiar with\b", r"\bpeople close to\b",
            r"\bon condition of anonymity\b",
        ]),
        t("D.1.5", "Secondhand hedging", Attribution, 1, Annotate, &[
            r"\breportedly\b", r"\ballegedly\b", r"\bpurportedly\b",
        ]),
        t("D.2.1", "Vague temporal anchoring", Attribution, 2, Annotate, &[]),
        t("D.2.2", "Stale statistics", Attribution, 2, Annotate, &[]),
        t("D.3.1", "Motive certainty", Attribution, 4, Rewrite, &[]),
        t("D.3.2", "Mind reading", Attribution, 4, Rewrite, &[]),
        t("D.4.1", "Viral amplification", Attribution, 2, Annotate, &[
            r"\bgoing viral\b", r"\bsocial media (is )?(ablaze|erupted|exploded)\b",
            r"\bthe internet (is )?(furious|outraged)\b",
        ]),
        t("D.4.2", "Manufactured consensus", Attribution, 3, Replace, &[
            r"\beveryone is talking about\b", r"\beverybody knows\b", r"\bit'?s no secret that\b",
        ]),
        t("D.5.1", "Uncited research", Attribution, 3, Annotate, &[
            r"\bstudies (show|prove|suggest)\b", r"\bresearch (shows|proves|suggests)\b",
            r"\bdata (shows?|proves?)\b", r"\bscience (says|tells us)\b",
        ]),
        t("D.5.2", "Numberless polling", Attribution, 2, Annotate, &[
            r"\bpolls (show|suggest)\b", r"\bsurveys (show|suggest)\b",
        ]),

        // E: logical manipulation
        t("E.1.1", "Absolute terms", Fallacy, 3, Rewrite, &[]),
        t("E.1.2", "Universal inflation", Fallacy, 2, Rewrite, &[
            r"\bevery single\b", r"\bwithout exception\b", r"\bacross the board\b",
        ]),
        t("E.1.3", "Hyperbolic literally", Fallacy, 1, Annotate, &[
            r"\bliterally (every|no|all|none)\b",
        ]),
        t("E.2.1", "False dichotomy", Fallacy, 3, Annotate, &[]),
        t("E.2.2", "Forced choice framing", Fallacy, 2, Annotate, &[
            r"\beither we \w+ or\b", r"\bthe only (choice|option|alternative)\b",
        ]),
        t("E.3.1", "Slippery slope", Fallacy, 3, Annotate, &[
            r"\bslippery slope\b", r"\bwhere does it end\b", r"\bopen(s|ing)? the floodgates\b",
        ]),
        t("E.4.1", "Strawman attribution", Fallacy, 4, Annotate, &[]),
        t("E.5.1", "Tribal priming", Fallacy, 4, Replace, &[
            r"\breal americans?\b", r"\bcoastal elites?\b", r"\bthe establishment\b",
            r"\bmainstream media\b", r"\bthe swamp\b",
        ]),
        t("E.5.2", "Us-versus-them framing", Fallacy, 4, Annotate, &[]),
        t("E.6.1", "Guilt by association", Fallacy, 3, Annotate, &[]),
        t("E.7.1", "Fear-of-change appeals", Fallacy, 4, Replace, &[
            r"\bradical agenda\b", r"\bdestroy our way of life\b",
            r"\bthe end of \w+ as we know it\b",
        ]),
        t("E.8.1", "Whataboutism", Fallacy, 2, Annotate, &[
            r"\bbut what about\b",
        ]),
        t("E.9.1", "Hasty generalization", Fallacy, 3, Annotate, &[]),

        // F: structural and technical
        t("F.1.1", "Curiosity gap", Structural, 3, Rewrite, &[
            r"\byou won'?t believe\b", r"\bwhat happened next\b", r"\bhere'?s why\b",
            r"\bwait until you see\b",
        ]),
        t("F.1.2", "Withheld referent", Structural, 2, Rewrite, &[
            r"\bthis one (thing|trick|fact)\b", r"\bthe one thing\b",
        ]),
        t("F.2.1", "Quote truncation", Structural, 4, Annotate, &[]),
        t("F.3.1", "Headline-body mismatch", Structural, 4, Annotate, &[]),
        t("F.4.1", "Caps-lock emphasis", Structural, 2, Annotate, &[
            r"(?-i)\b[A-Z]{4,}\b",
        ]),
        t("F.4.2", "Punctuation pileups", Structural, 2, Remove, &[
            r"!{2,}", r"\?!+", r"!\?+",
        ]),
        t("F.5.1", "Unverifiable superlatives", Structural, 2, Annotate, &[
            r"\bbest ever\b", r"\bworst in history\b", r"\bfirst of its kind\b",
            r"\blike never before\b",
        ]),
        t("F.6.1", "Listicle teaser", Structural, 2, Rewrite, &[
            r"\b\d+ (things|reasons|ways|facts) (you|that|why)\b",
        ]),
        t("F.7.1", "Second-person dragnet", Structural, 2, Annotate, &[
            r"\bwhat (it|this) means for you\b", r"\byou need to know\b",
        ]),
        t("F.8.1", "Breathless fragment stacking", Structural, 1, Annotate, &[]),
    ]
}
