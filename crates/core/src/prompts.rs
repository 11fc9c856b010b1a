pub fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the user's question based ONLY on the context provided below.
If the answer is not in the context, clearly state that you could not find the answer in the document.
Always reply in a beginners english tone.
The answer should be elaborate and detailed.

Context:
---
{context}
---

Question: {question}
"
    )
}

pub fn summary_prompt(content: &str) -> String {
    format!(
        "Summarize the following document content in a concise manner:\n\n{content}\n\nSummary:"
    )
}

const RISK_ARCHETYPES: &str = r#"1. Lock-in Period
   "This agreement is subject to a mandatory lock-in period of 12 months. Should the Tenant vacate the premises before the expiration of this period for any reason whatsoever, they will be liable to pay the rent for the entire remaining duration of the lock-in period."
   Why it's risky: the tenant pays for the full term even with a legitimate reason to leave, with no smaller, more reasonable penalty.

2. Notice Period
   "The Tenant must provide a written notice period of no less than 90 days before vacating the premises. Failure to provide adequate notice will result in the forfeiture of the entire security deposit and a penalty equivalent to one additional month's rent."
   Why it's risky: a 90-day notice period is excessively long for a residential tenant, and the double penalty is punitive.

3. Force Majeure
   "The Tenant's obligation to pay rent shall not be waived, excused, or reduced due to any event of Force Majeure, including but not limited to natural disasters, epidemics, government-mandated lockdowns, or any other event that renders the property temporarily uninhabitable."
   Why it's risky: all the risk of unforeseen, catastrophic events sits with the tenant, who pays rent for a property they may not be able to live in.

4. Maintenance and Repair Charges
   "The Tenant shall be solely responsible for all maintenance and repairs, including those for major appliances (e.g., geyser, air conditioner) and structural elements, excluding only the foundation and outer walls. All repairs must be conducted by a Landlord-approved vendor at the Tenant's expense."
   Why it's risky: the landlord's responsibility for major systems and normal wear-and-tear shifts to the tenant, with large unexpected costs.

5. Subletting
   "Subletting the property, in whole or in part, is strictly prohibited. Any unauthorized subletting will be considered a material breach of this agreement, resulting in immediate termination of the lease, eviction, and a penalty fee equivalent to three month's rent."
   Why it's risky: an extreme financial penalty and immediate eviction with no room for discussion or remedy.

6. Termination Clause (By Landlord)
   "Notwithstanding the fixed lease term, the Landlord reserves the right to terminate this agreement for any reason, or for no reason at all, by providing the Tenant with just 30 days' written notice."
   Why it's risky: a termination-for-convenience clause nullifies the security of a fixed-term lease.

7. Indemnity Clause
   "The Tenant agrees to indemnify, defend, and hold harmless the Landlord from and against any and all claims, liabilities, and damages arising from any injury or damage occurring on the premises, caused by the Tenant, their guests, or any third party, regardless of whether the Landlord's own negligence contributed in part to such damage."
   Why it's risky: an overly broad indemnity that makes the tenant answer for the landlord's partial fault as well."#;

pub fn risk_prompt(content: &str) -> String {
    format!(
        r#"You are a risk identifier.

INSTRUCTIONS:
The clauses below are examples of risky statements in rental agreements.

{RISK_ARCHETYPES}

TASK:
- You are given OCR extracted text from a rental agreement document.
- Extract and list all the risky statements/clauses from the text using the instructions above.
- "statement" must be the exact wording of the input text you identify as risky.
- "explanation" must briefly explain why the statement is risky.

ANSWER FORMAT:
Return a JSON array of objects, each with the keys "statement" and "explanation". Example:
[
  {{"statement": "The Tenant must provide a written notice period of no less than 90 days before vacating the premises.", "explanation": "A 90-day notice period is excessively long for a residential tenant."}}
]

INPUT TEXT:

{content}
"#
    )
}
