//! Routing rule patterns.
//!
//! All patterns run against normalised query text: lower case, single
//! spaces, punctuation other than `& - % .` removed.

/// Red-line requests: bribes, kickbacks, misuse of public money.
pub(super) const BRIBERY: &[&str] = &[
    r"\bbrib(?:e|es|ed|ing|ery)\b",
    r"\bspeed money\b",
    r"\bkick-?backs?\b",
    r"\bunder the table\b",
    r"\bgrease (?:money|payment)s?\b",
    r"\b(?:pay|give|offer)\w* (?:\w+ ){0,3}(?:extra|something|money|cash|gifts?) (?:\w+ ){0,4}(?:approv\w*|sanction\w*|clear\w*|officers?|officials?|speed|fast|quick\w*)\b",
    r"\bmisus\w* (?:\w+ ){0,3}funds?\b",
    r"\bembezzl\w*",
    r"\bsiphon\w*",
    r"\bdivert\w* (?:\w+ ){0,2}funds?\b",
    r"\b(?:fake|forged?|inflated) (?:bills?|invoices?|receipts?|estimates?)\b",
    r"\b(?:inflate|pad) (?:the )?(?:costs?|bills?|estimates?)\b",
    r"\bbypass (?:the )?(?:procedure|process|approval|rules)\b",
];

pub(super) const ABUSIVE: &[&str] = &[
    r"\b(?:idiot|stupid|moron|dumb|fool|loser|bastard|jerk)s?\b",
    r"\bf+u+c+k+\w*",
    r"\bsh[i1]t\w*",
    r"\bcrap\b",
    r"\bdamn\b",
    r"\bshut up\b",
    r"\buseless (?:bot|assistant|machine|thing)\b",
    r"\byou suck\b",
    r"\bgo to hell\b",
];

/// Greetings and small talk. Matched against the whole query.
pub(super) const BANTER_PHRASES: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hiya",
    "salam",
    "assalam ?o ?alaikum",
    "aoa",
    "good (?:morning|afternoon|evening|night)",
    "thanks?",
    "thank you(?: so much| very much)?",
    "ok(?:ay)?",
    "bye",
    "goodbye",
    "see you",
    "how are you(?: doing)?",
    "who are you",
    "what are you",
    "what (?:s|is) your name",
    "nice",
    "cool",
    "great",
    "lol",
    "haha",
];

pub(super) const BANTER_SUFFIX: &str = r"(?: (?:there|bot|friend|again))?";

pub(super) const OFF_SCOPE_MEDICAL: &[&str] = &[
    r"\b(?:symptoms?|diseases?|fever|headache|diabetes|covid|vaccines?|medicines?|tablets?|diagnos\w+|pregnan\w+|doctor)\b",
    r"\bblood (?:pressure|sugar)\b",
    r"\bcure for\b",
];

pub(super) const OFF_SCOPE_SPORTS: &[&str] = &[
    r"\b(?:cricket|football|soccer|hockey|tennis|olympics?|fifa|ipl|psl|wickets?|batsman|bowler|squash)\b",
    r"\bworld cup\b",
    r"\bmatch (?:score|result)s?\b",
];

pub(super) const OFF_SCOPE_POLITICS: &[&str] = &[
    r"\belections?\b",
    r"\bvot(?:e|ing|ers?)\b",
    r"\bpolitic(?:s|al|ians?)\b",
    r"\bwho (?:will|should) win\b",
    r"\b(?:best|worst) (?:party|leader|government)\b",
    r"\byour (?:opinion|view)s? (?:on|about) (?:the )?government\b",
];

pub(super) const OFF_SCOPE_GENERAL: &[&str] = &[
    r"\bcapital (?:city )?of\b",
    r"\bpopulation of\b",
    r"\b(?:tallest|largest|longest|highest) (?:mountain|river|building|country)\b",
    r"\bweather\b",
    r"\brecipes?\b",
    r"\b(?:movies?|songs?|poems?|jokes?)\b",
    r"\bstock (?:price|market)\b",
    r"\bbitcoin\b",
    r"\btranslate\b",
    r"\bwho (?:invented|discovered)\b",
];

/// Domain-governance vocabulary that must never be refused.
pub(super) const WHITELIST: &[&str] = &[
    r"\bfunds? utili[sz]ation\b",
    r"\butili[sz]ation (?:report|certificate|statement)s?\b",
    r"\brelease of funds\b",
    r"\bfunds? release\b",
    r"\baudit\w*",
    r"\banti-corruption\b",
    r"\baccountab\w+",
    r"\bvigilance\b",
    r"\bgrievance\w*",
    r"\bfinancial (?:rules|management|controls?)\b",
    r"\bprocurement rules\b",
    r"\breport\w* (?:a |an |the )?(?:bribe\w*|corruption|misuse|fraud)\b",
];

pub(super) const NUMERIC_QUERY: &[&str] = &[
    r"\bhow (?:much|many)\b",
    r"\b(?:limit|ceiling|threshold|percentage|percent|amount|rs|pkr|million|billion|crore)\b",
    r"%",
    r"\bcost (?:of|limit)\b",
];

pub(super) const DEFINITION_QUERY: &[&str] = &[
    r"^(?:define|definition of)\b",
    r"\bmeaning of\b",
    r"\bwhat is meant by\b",
    r"\bstands? for\b",
    r"^what (?:is|are) (?:an? )?[\w.&-]+$",
    r"^what does .+ mean$",
];

pub(super) const PROCEDURE_QUERY: &[&str] = &[
    r"^how (?:to|do|does|can|should|is|are)\b",
    r"\bsteps?\b",
    r"\bprocedures?\b",
    r"\bprocess (?:of|for)\b",
];

pub(super) const COMPLIANCE_QUERY: &[&str] = &[
    r"\b(?:mandatory|required|requirements?|compliance|comply|allowed|permissible|prohibited|obligat\w+|must)\b",
];

pub(super) const TIMELINE_QUERY: &[&str] = &[
    r"\b(?:when|deadline|timeline|duration|due date|time limit|by when)\b",
    r"\bhow long\b",
];

pub(super) const FORMULA_QUERY: &[&str] = &[
    r"\b(?:formula|calculat\w+|comput\w+|method(?:ology)?|irr|npv|bcr|discount rate)\b",
    r"\bbenefit cost ratio\b",
];

pub(super) const MONITORING_QUERY: &[&str] = &[
    r"\b(?:monitor\w*|evaluat\w*|m&e)\b",
    r"\bpc-?(?:iii|iv|v)\b",
    r"\bprogress reports?\b",
    r"\bthird party validation\b",
];

/// Retrieval hint vocabularies. Matched against queries and chunk text.
pub(super) const HINT_PROCEDURE: &str =
    r"\b(?:procedures?|process|steps?|submit\w*|submission|prepar\w+|approv\w+|apply|application|forward\w*)\b";

pub(super) const HINT_FORMULA: &str =
    r"\b(?:formula|calculat\w+|comput\w+|method\w*|ratio|irr|npv|discount\w*|rate of return)\b";

pub(super) const HINT_MONITORING: &str =
    r"\b(?:monitor\w*|evaluat\w*|m&e|progress|review\w*|inspect\w*|pc-?iii|pc-?iv)\b";

pub(super) const HINT_NUMERIC: &str =
    r"\bhow (?:much|many)\b|\b(?:cost|amount|limit|ceiling|threshold|percentage|percent|rs|pkr|million|billion|crore|lakh|budget)\b|%|\d";
